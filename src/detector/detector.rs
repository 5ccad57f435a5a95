//! 检测器核心：整合各类分析器，输出检测结果
use std::sync::Arc;
use tracing::debug;

use super::analyzer::{
    Analyzer, CookieAnalyzer, HeaderAnalyzer, HtmlAnalyzer, MetaAnalyzer, ScriptAnalyzer, UrlAnalyzer,
};
use super::resolver::ImplicationResolver;
use crate::compiler::{Signature, SignatureStore};
use crate::fetcher::PageEvidence;
use crate::rule::Detection;
use crate::utils::RawDetections;

/// 技术检测器（签名库只读共享，可廉价克隆到各工作协程）
#[derive(Debug, Clone)]
pub struct TechDetector {
    store: Arc<SignatureStore>,
}

impl TechDetector {
    pub fn new(store: Arc<SignatureStore>) -> Self {
        Self { store }
    }

    /// 完整检测：模式匹配 + 隐含关系解析
    pub fn detect(&self, pages: &[PageEvidence]) -> Vec<Detection> {
        let raw = self.match_evidence(pages);
        ImplicationResolver::resolve(raw, &self.store)
    }

    /// 仅执行模式匹配，结果按签名库顺序输出（均为直接检测）
    /// 版本提取顺序：页面按爬取顺序，单页内依次为 URL、Header、Cookie、Meta、Script、HTML
    pub fn match_evidence(&self, pages: &[PageEvidence]) -> Vec<Detection> {
        let mut detected = RawDetections::new();

        for page in pages {
            UrlAnalyzer::analyze(&self.store, page, &mut detected);
            HeaderAnalyzer::analyze(&self.store, page, &mut detected);
            CookieAnalyzer::analyze(&self.store, page, &mut detected);
            MetaAnalyzer::analyze(&self.store, page, &mut detected);
            ScriptAnalyzer::analyze(&self.store, page, &mut detected);
            HtmlAnalyzer::analyze(&self.store, page, &mut detected);
        }

        debug!("模式匹配完成：页面数={}，命中技术数={}", pages.len(), detected.len());

        // 转换为最终结果（库顺序）
        self.store
            .all()
            .iter()
            .filter_map(|signature| {
                let (confidence, version) = detected.remove(&signature.name)?;
                Some(Self::build_detection(&self.store, signature, confidence, version, false))
            })
            .collect()
    }

    /// 由签名构建检测项（转换分类ID为分类名称）
    pub fn build_detection(
        store: &SignatureStore,
        signature: &Signature,
        confidence: u8,
        version: Option<String>,
        implied: bool,
    ) -> Detection {
        Detection {
            name: signature.name.clone(),
            categories: signature.category_ids.clone(),
            category_names: store.category_names(&signature.category_ids),
            version,
            confidence: confidence.min(100),
            implied,
        }
    }
}
