use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Statistics of the solver, accumulated over all solve calls.
#[derive(Clone, Default, Debug)]
pub struct Stats {
    pub solve_time: Duration,
    pub num_solves: u64,
    pub num_unknown: u64,
    pub num_variables: usize,
    pub num_constraints: usize,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "solves:       {}", self.num_solves)?;
        writeln!(f, "solve time:   {:.6} s", self.solve_time.as_secs_f64())?;
        writeln!(f, "unknown:      {}", self.num_unknown)?;
        writeln!(f, "variables:    {}", self.num_variables)?;
        write!(f, "constraints:  {}", self.num_constraints)
    }
}
