pub mod lounge;

// 重新导出常用类型和函数，方便外部使用
pub use lounge::{
    client::LoungeClient,
    config::LoungeConfig,
    error::{classify, ErrorKind, LoungeError},
    session::{SessionContext, SessionUser},
};
