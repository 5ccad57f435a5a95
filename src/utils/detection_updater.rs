//! 检测结果更新工具
//! 负责合并同一技术的多次命中（取最高置信度、保留首个版本）

use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// 原始检测结果：技术名 -> (置信度, 版本)
pub type RawDetections = HashMap<String, (u8, Option<String>)>;

/// 检测结果更新工具
pub struct DetectionUpdater;

impl DetectionUpdater {
    /// 合并一次命中
    /// 置信度取最大值（上限100），版本只在尚未提取时写入
    pub fn update(
        detected: &mut RawDetections,
        tech_name: &str,
        confidence: u8,
        version: Option<String>,
    ) {
        let conf = confidence.min(100);
        let version = version.filter(|v| !v.is_empty());

        match detected.entry(tech_name.to_string()) {
            Entry::Occupied(mut entry) => {
                let (existing_conf, existing_version) = entry.get_mut();
                *existing_conf = (*existing_conf).max(conf);

                if existing_version.is_none() {
                    *existing_version = version;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((conf, version));
            }
        }
    }
}
