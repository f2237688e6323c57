pub mod canvas_ops;
pub mod fill;
pub mod script;
pub mod shapes;
