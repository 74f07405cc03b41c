use std::fmt;

use crate::metrics::Metric;

/// A condition that the application wait for.
#[derive(Debug)]
pub(crate) enum Condition {
    GE(Metric),
    EQ(Metric),
}

impl Condition {
    fn metric(&self) -> &Metric {
        match self {
            Condition::GE(v) | Condition::EQ(v) => v,
        }
    }

    fn op(&self) -> &'static str {
        match self {
            Condition::GE(_) => ">=",
            Condition::EQ(_) => "==",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metric();
        write!(f, "{}{}{}", m.name(), self.op(), m)
    }
}
