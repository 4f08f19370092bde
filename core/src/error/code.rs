/// Stable numeric classification of failures, for callers that report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ParseError = 2,
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
    PluginNotFound = 20,
    PluginError = 21,
    ResolveError = 22,
    JobFailed = 23,
    Cancelled = 31,
    ApprovalRejected = 40,
    FileNotFound = 60,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
