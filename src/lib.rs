//! rswebanalyze - Rust 网站技术栈批量扫描引擎
//! 抓取主机页面（可选爬取同源链接），按 Wappalyzer 风格签名识别技术并解析隐含关系

// 导出全局错误类型
pub use self::error::{RswebanalyzeError, RswResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, ScanConfig};

// 导出规则模块核心接口
pub use self::rule::{
    CategoryRule, Detection, RuleFileType, RuleLibrary, RuleLoader, ScanResult, SignatureSource,
    TechRule,
};

// 导出编译模块核心接口
pub use self::compiler::{CompiledPattern, Implication, RuleCompiler, Signature, SignatureStore};

// 导出提取模块核心接口
pub use self::extractor::HtmlExtractor;

// 导出抓取与爬取模块核心接口
pub use self::crawler::Crawler;
pub use self::fetcher::{HttpFetcher, PageEvidence, PageFetcher};

// 导出检测模块核心接口
pub use self::detector::{ImplicationResolver, TechDetector};

// 导出调度与引擎入口
pub use self::dispatcher::{Dispatcher, ResultStream};
pub use self::engine::{init, Engine, HostSource};

// 导出工具模块核心接口
pub use self::utils::{cancel_pair, CancelHandle, CancelSignal, HeaderConverter, VersionExtractor};

// 声明所有子模块
pub mod compiler;
pub mod config;
pub mod crawler;
pub mod detector;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod rule;
pub mod utils;
