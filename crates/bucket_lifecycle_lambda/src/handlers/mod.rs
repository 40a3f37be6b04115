pub mod dispatcher;
pub mod eraser;
pub mod reporter;
