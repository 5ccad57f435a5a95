//! 规则模块：负责签名定义的加载与数据模型定义
pub mod model;
pub mod loader;

// 导出核心接口
pub use self::model::{CategoryRule, Detection, RuleLibrary, ScanResult, TechRule};
pub use self::loader::{RuleFileType, RuleLoader, SignatureSource};
