//! Runtime values and expression evaluation for minitla.

pub mod eval;
pub mod next;
pub mod value;

pub use eval::{
    domain_of, eval, eval_bool, At, Env, ErrorKind, EvalContext, EvalError, EvalResult, VarSlots,
};
pub use next::{candidates, eval_next, is_resolved, unenumerable, Candidates};
pub use value::{Value, ValueError, ValueResult};
