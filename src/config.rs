use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::topology::BodyPartTopology;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decode: DecodeOptions,
    /// 任意のカスタムトポロジー。省略時はプリセットを使う
    pub topology: Option<TopologyConfig>,
}

/// デコード時の調整パラメータ
#[derive(Debug, Deserialize, Clone)]
pub struct DecodeOptions {
    /// キーポイントの最低スコア。Noneならフィルタしない
    #[serde(default)]
    pub part_threshold: Option<f32>,
    /// PAFエッジコストの最低値。Noneならエンジン内部の正コストカットオフ
    #[serde(default)]
    pub pair_threshold: Option<f32>,
    /// NMSの半窓サイズ。3なら実効 (3*2+1)x(3*2+1)
    #[serde(default = "default_nms_window")]
    pub nms_window: usize,
    /// 検出人数の上限。平均スコア上位N人を残す。Noneなら無制限
    #[serde(default)]
    pub max_humans: Option<usize>,
}

fn default_nms_window() -> usize {
    3
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            part_threshold: None,
            pair_threshold: None,
            nms_window: default_nms_window(),
            max_humans: None,
        }
    }
}

/// TOMLからのトポロジー定義
#[derive(Debug, Deserialize, Clone)]
pub struct TopologyConfig {
    pub parts: Vec<String>,
    pub edges: Vec<(usize, usize)>,
}

impl TopologyConfig {
    pub fn into_topology(self) -> Result<BodyPartTopology> {
        BodyPartTopology::new(self.parts, self.edges).context("invalid topology config")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
