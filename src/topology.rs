use anyhow::{bail, Result};
use serde::Deserialize;

/// モデルごとの骨格トポロジー（部位名とエッジの静的定義）
///
/// 部位数はヒートマップのチャンネル数と一致させる。実行時には変更しない。
#[derive(Debug, Clone, Deserialize)]
pub struct BodyPartTopology {
    pub parts: Vec<String>,
    pub edges: Vec<(usize, usize)>,
}

impl BodyPartTopology {
    pub fn new(parts: Vec<String>, edges: Vec<(usize, usize)>) -> Result<Self> {
        let topology = Self { parts, edges };
        topology.validate()?;
        Ok(topology)
    }

    /// 部位数とエッジの整合性チェック（設定読み込み時に呼ぶ）
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            bail!("topology has no parts");
        }
        for &(from, to) in &self.edges {
            if from >= self.parts.len() || to >= self.parts.len() {
                bail!(
                    "edge ({}, {}) out of range for {} parts",
                    from,
                    to,
                    self.parts.len()
                );
            }
        }
        Ok(())
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn part_index(&self, name: &str) -> Option<usize> {
        self.parts.iter().position(|p| p == name)
    }

    /// COCO 17部位（MoveNet / SimplePose系のシングルパーソンモデル）
    pub fn coco_17() -> Self {
        let parts = [
            "nose",
            "left eye",
            "right eye",
            "left ear",
            "right ear",
            "left shoulder",
            "right shoulder",
            "left elbow",
            "right elbow",
            "left wrist",
            "right wrist",
            "left hip",
            "right hip",
            "left knee",
            "right knee",
            "left ankle",
            "right ankle",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let edges = vec![
            (9, 7),   // left wrist - left elbow
            (7, 5),   // left elbow - left shoulder
            (5, 6),   // left shoulder - right shoulder
            (6, 8),   // right shoulder - right elbow
            (8, 10),  // right elbow - right wrist
            (5, 11),  // left shoulder - left hip
            (11, 12), // left hip - right hip
            (12, 6),  // right hip - right shoulder
            (11, 13), // left hip - left knee
            (13, 15), // left knee - left ankle
            (12, 14), // right hip - right knee
            (14, 16), // right knee - right ankle
        ];
        Self { parts, edges }
    }

    /// OpenPose 18部位（PAFマルチパーソンモデル、backgroundチャンネルは含まない）
    pub fn openpose_18() -> Self {
        let parts = [
            "nose",
            "neck",
            "right shoulder",
            "right elbow",
            "right wrist",
            "left shoulder",
            "left elbow",
            "left wrist",
            "right hip",
            "right knee",
            "right ankle",
            "left hip",
            "left knee",
            "left ankle",
            "right eye",
            "left eye",
            "right ear",
            "left ear",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let edges = vec![
            (1, 2),   // neck - right shoulder
            (1, 5),   // neck - left shoulder
            (2, 3),   // right shoulder - right elbow
            (3, 4),   // right elbow - right wrist
            (5, 6),   // left shoulder - left elbow
            (6, 7),   // left elbow - left wrist
            (1, 8),   // neck - right hip
            (8, 9),   // right hip - right knee
            (9, 10),  // right knee - right ankle
            (1, 11),  // neck - left hip
            (11, 12), // left hip - left knee
            (12, 13), // left knee - left ankle
            (1, 0),   // neck - nose
            (0, 14),  // nose - right eye
            (14, 16), // right eye - right ear
            (0, 15),  // nose - left eye
            (15, 17), // left eye - left ear
            (2, 16),  // right shoulder - right ear
            (5, 17),  // left shoulder - left ear
        ];
        Self { parts, edges }
    }

    /// Baseline3DPose系 18部位（3Dボリュームモデル）
    pub fn baseline3d_18() -> Self {
        let parts = [
            "pelvis",
            "right hip",
            "right knee",
            "right ankle",
            "left hip",
            "left knee",
            "left ankle",
            "torso",
            "neck",
            "nose",
            "head",
            "left shoulder",
            "left elbow",
            "left wrist",
            "right shoulder",
            "right elbow",
            "right wrist",
            "thorax",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let edges = vec![
            (0, 7),   // pelvis - torso
            (7, 8),   // torso - neck
            (8, 9),   // neck - nose
            (9, 10),  // nose - head
            (8, 11),  // neck - left shoulder
            (11, 12), // left shoulder - left elbow
            (12, 13), // left elbow - left wrist
            (8, 14),  // neck - right shoulder
            (14, 15), // right shoulder - right elbow
            (15, 16), // right elbow - right wrist
            (0, 1),   // pelvis - right hip
            (1, 2),   // right hip - right knee
            (2, 3),   // right knee - right ankle
            (0, 4),   // pelvis - left hip
            (4, 5),   // left hip - left knee
            (5, 6),   // left knee - left ankle
        ];
        Self { parts, edges }
    }
}
