use crate::topology::BodyPartTopology;

/// 2Dキーポイント（正規化座標 0.0〜1.0、y下向き・原点左上）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint2D {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint2D {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// 表示系向けのy反転
    pub fn flipped_y(&self) -> Self {
        Self {
            x: self.x,
            y: 1.0 - self.y,
            score: self.score,
        }
    }
}

/// 3Dキーポイント（各軸正規化 0.0〜1.0、y下向き）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub score: f32,
}

impl Keypoint3D {
    pub fn new(x: f32, y: f32, z: f32, score: f32) -> Self {
        Self { x, y, z, score }
    }

    pub fn flipped_y(&self) -> Self {
        Self {
            x: self.x,
            y: 1.0 - self.y,
            z: self.z,
            score: self.score,
        }
    }
}

/// 骨格線。edgeはトポロジーのエッジリスト上のインデックス
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2D {
    pub edge: usize,
    pub from: Keypoint2D,
    pub to: Keypoint2D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3D {
    pub edge: usize,
    pub from: Keypoint3D,
    pub to: Keypoint3D,
}

/// 検出された1人分の2D骨格
///
/// keypointsはトポロジーの部位インデックス順（未検出はNone）。
/// linesは両端が存在するエッジのみ。
#[derive(Debug, Clone)]
pub struct Human2D {
    pub keypoints: Vec<Option<Keypoint2D>>,
    pub lines: Vec<Line2D>,
}

impl Human2D {
    /// キーポイント列からlinesを構成して生成
    pub fn from_keypoints(keypoints: Vec<Option<Keypoint2D>>, topology: &BodyPartTopology) -> Self {
        assert_eq!(
            keypoints.len(),
            topology.part_count(),
            "keypoint count {} does not match topology part count {}",
            keypoints.len(),
            topology.part_count()
        );
        let lines = make_lines_2d(&keypoints, topology);
        Self { keypoints, lines }
    }

    /// 閾値未満のキーポイントを落とし、触れるlinesも除く
    pub fn filtered(&self, part_threshold: Option<f32>, topology: &BodyPartTopology) -> Self {
        let threshold = match part_threshold {
            Some(t) => t,
            None => return self.clone(),
        };
        let keypoints: Vec<Option<Keypoint2D>> = self
            .keypoints
            .iter()
            .map(|kp| kp.filter(|kp| kp.score > threshold))
            .collect();
        Self::from_keypoints(keypoints, topology)
    }

    /// 存在するキーポイントの平均スコア（空なら0）
    pub fn average_score(&self) -> f32 {
        let present: Vec<f32> = self.keypoints.iter().flatten().map(|kp| kp.score).collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().sum::<f32>() / present.len() as f32
    }
}

/// 検出された1人分の3D骨格
#[derive(Debug, Clone)]
pub struct Human3D {
    pub keypoints: Vec<Option<Keypoint3D>>,
    pub lines: Vec<Line3D>,
}

impl Human3D {
    pub fn from_keypoints(keypoints: Vec<Option<Keypoint3D>>, topology: &BodyPartTopology) -> Self {
        assert_eq!(
            keypoints.len(),
            topology.part_count(),
            "keypoint count {} does not match topology part count {}",
            keypoints.len(),
            topology.part_count()
        );
        let lines = make_lines_3d(&keypoints, topology);
        Self { keypoints, lines }
    }

    pub fn filtered(&self, part_threshold: Option<f32>, topology: &BodyPartTopology) -> Self {
        let threshold = match part_threshold {
            Some(t) => t,
            None => return self.clone(),
        };
        let keypoints: Vec<Option<Keypoint3D>> = self
            .keypoints
            .iter()
            .map(|kp| kp.filter(|kp| kp.score > threshold))
            .collect();
        Self::from_keypoints(keypoints, topology)
    }

    pub fn average_score(&self) -> f32 {
        let present: Vec<f32> = self.keypoints.iter().flatten().map(|kp| kp.score).collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().sum::<f32>() / present.len() as f32
    }
}

fn make_lines_2d(keypoints: &[Option<Keypoint2D>], topology: &BodyPartTopology) -> Vec<Line2D> {
    topology
        .edges
        .iter()
        .enumerate()
        .filter_map(|(edge, &(from, to))| {
            let from_kp = keypoints[from]?;
            let to_kp = keypoints[to]?;
            Some(Line2D {
                edge,
                from: from_kp,
                to: to_kp,
            })
        })
        .collect()
}

fn make_lines_3d(keypoints: &[Option<Keypoint3D>], topology: &BodyPartTopology) -> Vec<Line3D> {
    topology
        .edges
        .iter()
        .enumerate()
        .filter_map(|(edge, &(from, to))| {
            let from_kp = keypoints[from]?;
            let to_kp = keypoints[to]?;
            Some(Line3D {
                edge,
                from: from_kp,
                to: to_kp,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_topology() -> BodyPartTopology {
        BodyPartTopology::new(
            vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
            vec![(0, 1), (1, 2), (2, 3)],
        )
        .unwrap()
    }

    #[test]
    fn test_lines_only_for_present_endpoints() {
        let topology = test_topology();
        let keypoints = vec![
            Some(Keypoint2D::new(0.1, 0.1, 0.9)),
            Some(Keypoint2D::new(0.2, 0.2, 0.8)),
            None,
            Some(Keypoint2D::new(0.4, 0.4, 0.7)),
        ];
        let human = Human2D::from_keypoints(keypoints, &topology);
        // エッジ(1,2)と(2,3)はcが無いので落ちる
        assert_eq!(human.lines.len(), 1);
        assert_eq!(human.lines[0].edge, 0);
    }

    #[test]
    fn test_filtered_drops_keypoint_and_lines() {
        let topology = test_topology();
        let keypoints = vec![
            Some(Keypoint2D::new(0.1, 0.1, 0.9)),
            Some(Keypoint2D::new(0.2, 0.2, 0.05)),
            Some(Keypoint2D::new(0.3, 0.3, 0.8)),
            Some(Keypoint2D::new(0.4, 0.4, 0.7)),
        ];
        let human = Human2D::from_keypoints(keypoints, &topology);
        assert_eq!(human.lines.len(), 3);

        let filtered = human.filtered(Some(0.1), &topology);
        assert!(filtered.keypoints[1].is_none());
        // bを含むエッジ(0,1)と(1,2)が落ちる
        assert_eq!(filtered.lines.len(), 1);
        assert_eq!(filtered.lines[0].edge, 2);
    }

    #[test]
    fn test_filtered_none_threshold_is_identity() {
        let topology = test_topology();
        let keypoints = vec![
            Some(Keypoint2D::new(0.1, 0.1, 0.01)),
            None,
            None,
            None,
        ];
        let human = Human2D::from_keypoints(keypoints, &topology);
        let filtered = human.filtered(None, &topology);
        assert_eq!(filtered.keypoints[0], human.keypoints[0]);
    }

    #[test]
    fn test_average_score() {
        let topology = test_topology();
        let keypoints = vec![
            Some(Keypoint2D::new(0.0, 0.0, 0.4)),
            Some(Keypoint2D::new(0.0, 0.0, 0.6)),
            None,
            None,
        ];
        let human = Human2D::from_keypoints(keypoints, &topology);
        assert!((human.average_score() - 0.5).abs() < 1e-6);

        let empty = Human2D::from_keypoints(vec![None; 4], &topology);
        assert_eq!(empty.average_score(), 0.0);
    }

    #[test]
    fn test_flipped_y() {
        let kp = Keypoint2D::new(0.3, 0.2, 0.9);
        let flipped = kp.flipped_y();
        assert_eq!(flipped.x, 0.3);
        assert!((flipped.y - 0.8).abs() < 1e-6);
    }
}
