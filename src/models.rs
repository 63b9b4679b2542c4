// 网关数据模型定义
// 包含商户 (Comercio) 与POS终端 (PosComercio) 的核心数据结构

mod merchant;
mod terminal;

// 重新导出核心类型
pub use merchant::*;
pub use terminal::*;
