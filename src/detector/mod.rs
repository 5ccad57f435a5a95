//! 检测模块：技术检测核心逻辑
pub mod analyzer;
pub mod detector;
pub mod resolver;

// 导出核心接口
pub use self::analyzer::{
    Analyzer, CookieAnalyzer, HeaderAnalyzer, HtmlAnalyzer, MetaAnalyzer, ScriptAnalyzer, UrlAnalyzer,
};
pub use self::detector::TechDetector;
pub use self::resolver::ImplicationResolver;
