use crate::config::DecodeOptions;
use crate::decode::nms::{nms, Candidate};
use crate::skeleton::{Human2D, Keypoint2D};
use crate::tensor::FlatTensor;
use crate::topology::BodyPartTopology;

/// エッジコストの線積分サンプル数
const SAMPLE_COUNT: usize = 10;

/// あるエッジ種別で受理された候補ペア
#[derive(Debug, Clone, Copy)]
struct Connection {
    from: Candidate,
    to: Candidate,
    cost: f32,
}

/// PAFテンソルからマルチパーソンの骨格を組み立てる
///
/// テンソルは [1, H, W, C]、前半がconfidence枝、後半が2*edge_count本のPAF枝。
/// confidence枝のチャンネル数はトポロジーの部位数以上（background等の余剰は
/// 末尾にある前提）で、PAFバイアスは C - 2*edge_count として求める。
pub fn assemble(
    tensor: &FlatTensor,
    topology: &BodyPartTopology,
    options: &DecodeOptions,
) -> Vec<Human2D> {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 4, "paf tensor must have rank 4, got {:?}", shape);
    let (height, width, channels) = (shape[1], shape[2], shape[3]);
    assert!(
        channels >= topology.part_count() + topology.edge_count() * 2,
        "tensor has {} channels but topology needs {} parts + {} paf channels",
        channels,
        topology.part_count(),
        topology.edge_count() * 2
    );
    let paf_bias = channels - topology.edge_count() * 2;

    // 部位ごとのNMS候補は複数エッジで共有されるので一度だけ計算する
    let mut cache: Vec<Option<Vec<Candidate>>> = vec![None; topology.part_count()];
    let mut candidates_for = |part: usize, cache: &mut Vec<Option<Vec<Candidate>>>| {
        if cache[part].is_none() {
            cache[part] = Some(nms(tensor, part, options.nms_window, options.part_threshold));
        }
        cache[part].as_ref().unwrap().clone()
    };

    // 部位スロットの集合としての暫定骨格
    let mut humans: Vec<Vec<Option<Candidate>>> = Vec::new();

    for (edge, &(from_part, to_part)) in topology.edges.iter().enumerate() {
        let from_candidates = candidates_for(from_part, &mut cache);
        let to_candidates = candidates_for(to_part, &mut cache);
        let connections = edge_connections(
            tensor,
            edge,
            paf_bias,
            &from_candidates,
            &to_candidates,
            width,
            height,
            options.pair_threshold,
        );

        for connection in connections {
            // fromスロットに同一点を持つ骨格があれば繋ぐ、無ければ新規
            let existing = humans.iter_mut().find(|human| {
                matches!(human[from_part], Some(c)
                    if c.col == connection.from.col && c.row == connection.from.row)
            });
            match existing {
                Some(human) => {
                    if human[to_part].is_none() {
                        human[to_part] = Some(connection.to);
                    }
                }
                None => {
                    let mut human = vec![None; topology.part_count()];
                    human[from_part] = Some(connection.from);
                    human[to_part] = Some(connection.to);
                    humans.push(human);
                }
            }
        }
    }

    let mut humans: Vec<Human2D> = humans
        .into_iter()
        .map(|slots| {
            let keypoints: Vec<Option<Keypoint2D>> = slots
                .into_iter()
                .map(|slot| {
                    slot.map(|c| {
                        Keypoint2D::new(
                            (c.col as f32 + 0.5) / width as f32,
                            (c.row as f32 + 0.5) / height as f32,
                            c.value,
                        )
                    })
                })
                .collect();
            Human2D::from_keypoints(keypoints, topology)
        })
        .collect();

    // 人数上限: 平均スコア上位を残す
    if let Some(max_humans) = options.max_humans {
        humans.sort_by(|a, b| {
            b.average_score()
                .partial_cmp(&a.average_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        humans.truncate(max_humans);
    }

    humans
}

/// 1エッジ種別の候補ペアを線積分コストで評価し、greedyに1対1へ絞る
#[allow(clippy::too_many_arguments)]
fn edge_connections(
    tensor: &FlatTensor,
    edge: usize,
    paf_bias: usize,
    from_candidates: &[Candidate],
    to_candidates: &[Candidate],
    width: usize,
    height: usize,
    pair_threshold: Option<f32>,
) -> Vec<Connection> {
    let mut connections: Vec<Connection> = Vec::new();
    for &from in from_candidates {
        for &to in to_candidates {
            if from.col == to.col && from.row == to.row {
                continue;
            }
            let cost = line_integral(tensor, edge, paf_bias, from, to, width, height);
            // 閾値指定があれば絶対値で、無ければ正コストのみ通す
            let accepted = match pair_threshold {
                Some(threshold) => cost >= threshold,
                None => cost > 0.0,
            };
            if accepted {
                connections.push(Connection { from, to, cost });
            }
        }
    }

    connections.sort_by(|a, b| b.cost.partial_cmp(&a.cost).unwrap_or(std::cmp::Ordering::Equal));

    // コスト降順に走査し、既に使われた端点を含むペアを落とす
    let mut used_from: Vec<(i32, i32)> = Vec::new();
    let mut used_to: Vec<(i32, i32)> = Vec::new();
    let mut accepted: Vec<Connection> = Vec::new();
    for connection in connections {
        let from_key = (connection.from.col, connection.from.row);
        let to_key = (connection.to.col, connection.to.row);
        if used_from.contains(&from_key) || used_to.contains(&to_key) {
            continue;
        }
        used_from.push(from_key);
        used_to.push(to_key);
        accepted.push(connection);
    }
    accepted
}

/// 候補間の単位方向ベクトルとPAFベクトルの内積をサンプル平均したコスト
///
/// 内部10点を等間隔にサンプルし、グリッド座標は境界にクランプする。
fn line_integral(
    tensor: &FlatTensor,
    edge: usize,
    paf_bias: usize,
    from: Candidate,
    to: Candidate,
    width: usize,
    height: usize,
) -> f32 {
    let dx = (to.col - from.col) as f32;
    let dy = (to.row - from.row) as f32;
    let norm = (dx * dx + dy * dy).sqrt();
    if norm == 0.0 {
        return 0.0;
    }
    let (ux, uy) = (dx / norm, dy / norm);

    let mut cost = 0.0;
    for sample in 0..SAMPLE_COUNT {
        let t = (sample as f32 + 0.5) / SAMPLE_COUNT as f32;
        let sx = from.col as f32 + dx * t;
        let sy = from.row as f32 + dy * t;
        let col = (sx.round() as i64).clamp(0, width as i64 - 1) as usize;
        let row = (sy.round() as i64).clamp(0, height as i64 - 1) as usize;
        let paf_x = tensor.paf(0, row, col, edge * 2, paf_bias);
        let paf_y = tensor.paf(0, row, col, edge * 2 + 1, paf_bias);
        cost += paf_x * ux + paf_y * uy;
    }
    cost / SAMPLE_COUNT as f32
}
