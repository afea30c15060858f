//! Backend process supervision for the ZInspector shell: port selection, launch,
//! output capture and teardown.
//! ZInspector 殼層的後端程序監督：連接埠選擇、啟動、輸出擷取與終止。

pub mod launch;
pub mod log_line;
pub mod ports;
pub mod supervisor;

pub use launch::LaunchSpec;
pub use log_line::{classify_line, LineAssembler, LogSeverity};
pub use ports::{find_free_port, is_port_free, PortError};
pub use supervisor::{
    BackendLine, ExitReport, OutputStream, ProcessState, ProcessSupervisor, SupervisorError,
};
