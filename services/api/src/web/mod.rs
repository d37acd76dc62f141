pub mod rest;
pub mod state;

// Re-export the handlers so the binary that builds the router can reach them
// without spelling out the module path each time.
pub use rest::{
    create_lesson_handler, feedback_handler, get_lesson_handler, get_module_handler,
    get_turns_handler, link_lesson_handler, list_lessons_handler, submit_turn_handler,
    unlink_lesson_handler,
};
