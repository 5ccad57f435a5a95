//! 隐含关系解析
//! 沿 implies 边做工作队列遍历，补全被隐含的技术并向下传播置信度

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use super::detector::TechDetector;
use crate::compiler::SignatureStore;
use crate::rule::Detection;

/// 隐含关系解析器
pub struct ImplicationResolver;

impl ImplicationResolver {
    /// 解析隐含关系
    /// 输出顺序：直接检测项保持输入顺序，隐含项按发现顺序追加
    pub fn resolve(raw: Vec<Detection>, store: &SignatureStore) -> Vec<Detection> {
        let mut results = raw;
        // 已出现的技术（兼作访问集合）
        let mut seen: HashMap<String, usize> = results
            .iter()
            .enumerate()
            .map(|(idx, d)| (d.name.clone(), idx))
            .collect();
        let mut worklist: VecDeque<usize> = (0..results.len()).collect();

        while let Some(idx) = worklist.pop_front() {
            let Some(signature) = store.by_name(&results[idx].name) else {
                continue;
            };
            let source_conf = results[idx].confidence;

            for implication in &signature.implies {
                let Some(target) = store.by_name(&implication.name) else {
                    warn!(
                        "隐含技术不存在于规则库，已跳过：{} -> {}",
                        signature.name, implication.name
                    );
                    continue;
                };

                let offered = implication
                    .confidence
                    .map_or(source_conf, |declared| declared.min(source_conf));

                match seen.get(&target.name).copied() {
                    Some(existing) => {
                        if offered > results[existing].confidence {
                            debug!(
                                "隐含置信度提升：{} {} -> {}（来源：{}）",
                                target.name, results[existing].confidence, offered, signature.name
                            );
                            results[existing].confidence = offered;
                            worklist.push_back(existing);
                        }
                    }
                    None => {
                        debug!("隐含技术：{} -> {}，置信度={}", signature.name, target.name, offered);
                        let detection = TechDetector::build_detection(store, target, offered, None, true);
                        seen.insert(target.name.clone(), results.len());
                        worklist.push_back(results.len());
                        results.push(detection);
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Implication, Signature};

    fn sig(name: &str, implies: &[(&str, Option<u8>)]) -> Signature {
        Signature {
            name: name.to_string(),
            category_ids: vec![1],
            implies: implies
                .iter()
                .map(|(n, c)| Implication {
                    name: n.to_string(),
                    confidence: *c,
                })
                .collect(),
            ..Signature::default()
        }
    }

    fn direct(store: &SignatureStore, name: &str, confidence: u8) -> Detection {
        let signature = store.by_name(name).unwrap();
        TechDetector::build_detection(store, signature, confidence, None, false)
    }

    fn store(signatures: Vec<Signature>) -> SignatureStore {
        SignatureStore::new(signatures, HashMap::from([(1, "CMS".to_string())]))
    }

    #[test]
    fn test_implied_technology_added_with_flag() {
        let store = store(vec![sig("WordPress", &[("PHP", None)]), sig("PHP", &[])]);
        let resolved = ImplicationResolver::resolve(vec![direct(&store, "WordPress", 100)], &store);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "WordPress");
        assert!(!resolved[0].implied);
        assert_eq!(resolved[1].name, "PHP");
        assert!(resolved[1].implied);
        assert_eq!(resolved[1].confidence, 100);
        assert_eq!(resolved[1].category_names, vec!["CMS".to_string()]);
    }

    #[test]
    fn test_chain_propagates_and_declared_confidence_caps() {
        let store = store(vec![
            sig("A", &[("B", Some(50))]),
            sig("B", &[("C", None)]),
            sig("C", &[]),
        ]);
        let resolved = ImplicationResolver::resolve(vec![direct(&store, "A", 80)], &store);

        let names: Vec<_> = resolved.iter().map(|d| (d.name.as_str(), d.confidence)).collect();
        assert_eq!(names, vec![("A", 80), ("B", 50), ("C", 50)]);
    }

    #[test]
    fn test_cycle_terminates_without_duplicates() {
        let store = store(vec![sig("A", &[("B", None)]), sig("B", &[("A", None)])]);
        let resolved = ImplicationResolver::resolve(vec![direct(&store, "A", 100)], &store);

        assert_eq!(resolved.len(), 2);
        assert!(!resolved[0].implied);
        assert!(resolved[1].implied);
    }

    #[test]
    fn test_direct_detection_never_flagged_and_confidence_raised() {
        let store = store(vec![sig("A", &[("B", None)]), sig("B", &[("C", None)]), sig("C", &[])]);
        let raw = vec![direct(&store, "A", 90), direct(&store, "B", 40)];
        let resolved = ImplicationResolver::resolve(raw, &store);

        assert_eq!(resolved.len(), 3);
        assert_eq!((resolved[1].name.as_str(), resolved[1].confidence, resolved[1].implied), ("B", 90, false));
        // 提升后的置信度继续向下传播
        assert_eq!((resolved[2].name.as_str(), resolved[2].confidence), ("C", 90));
    }

    #[test]
    fn test_unknown_implied_name_skipped() {
        let store = store(vec![sig("A", &[("Ghost", None)])]);
        let resolved = ImplicationResolver::resolve(vec![direct(&store, "A", 100)], &store);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let store = store(vec![
            sig("A", &[("B", Some(70)), ("C", None)]),
            sig("B", &[("C", None)]),
            sig("C", &[("A", None)]),
        ]);
        let once = ImplicationResolver::resolve(vec![direct(&store, "A", 100)], &store);
        let twice = ImplicationResolver::resolve(once.clone(), &store);
        assert_eq!(once, twice);
    }
}
