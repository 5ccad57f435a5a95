//! 编译模块：将原始规则编译为可执行的签名库
pub mod pattern;
pub mod compiler;

pub use self::pattern::{
    CompiledPattern, Implication, Matcher, PatternHit, Signature, SignatureStore,
};
pub use self::compiler::{CompileStats, RuleCompiler, DEFAULT_CONFIDENCE};
