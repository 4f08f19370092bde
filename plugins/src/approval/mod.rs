pub mod console;
pub mod fixed;

pub use console::ConsoleApprovalGate;
pub use fixed::StaticApprovalGate;
