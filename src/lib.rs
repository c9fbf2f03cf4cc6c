pub mod check;
pub mod driver;
pub mod interpreter;
pub mod ir;
pub mod runtime;
