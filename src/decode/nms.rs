use crate::tensor::FlatTensor;

/// NMSが受理した局所最大の候補点（グリッド座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub col: i32,
    pub row: i32,
    pub value: f32,
}

/// 1チャンネルのconfidence mapから局所最大の候補を列挙する
///
/// 単一ラスタスキャンで列ごとの暫定最大を持ち回る方式。
/// 受理された候補は、その時点で (window*2+1)^2 の近傍内の最大であることが保証される。
/// - セル値より大きい暫定最大が±window列内にあれば現セルは棄却
/// - 現セルより小さい暫定最大は無効化され、現セルがその列の暫定最大になる
/// - windowより古い行の暫定最大は、右2*window列以内の同一点参照を掃除してから確定
pub fn nms(
    tensor: &FlatTensor,
    channel: usize,
    window: usize,
    min_score: Option<f32>,
) -> Vec<Candidate> {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 4, "heatmap tensor must have rank 4, got {:?}", shape);
    let (height, width) = (shape[1], shape[2]);
    let r = window as i32;

    let mut state: Vec<Option<Candidate>> = vec![None; width];
    let mut results: Vec<Candidate> = Vec::with_capacity(20);

    for row in 0..height {
        for col in 0..width {
            let value = tensor.heatmap(0, row, col, channel);

            let lo = (col as i32 - r).max(0) as usize;
            let hi = ((col as i32 + r) as usize).min(width - 1);
            let mut superseded: Vec<usize> = Vec::new();
            let mut has_bigger = false;
            for target in lo..=hi {
                if let Some(point) = state[target] {
                    if point.value < value {
                        superseded.push(target);
                    } else if point.value > value {
                        has_bigger = true;
                        break;
                    }
                }
            }
            if !has_bigger {
                for target in superseded {
                    state[target] = None;
                }
                state[col] = Some(Candidate {
                    col: col as i32,
                    row: row as i32,
                    value,
                });
            }

            // windowより古い行の暫定最大を確定
            if let Some(point) = state[col] {
                if point.row < row as i32 - r {
                    finalize(&mut state, &mut results, col, window, point);
                }
            }
        }
    }

    // スキャン後に残った暫定最大を同じルールで確定
    for col in 0..width {
        let point = match state[col] {
            Some(point) => point,
            None => continue,
        };
        finalize(&mut state, &mut results, col, window, point);
    }

    if let Some(threshold) = min_score {
        results.retain(|c| c.value >= threshold);
    }
    results
}

/// 右側2*window列以内で同一の(row, col)を指す参照を消してから受理する
fn finalize(
    state: &mut [Option<Candidate>],
    results: &mut Vec<Candidate>,
    col: usize,
    window: usize,
    point: Candidate,
) {
    let hi = (col + window * 2).min(state.len() - 1);
    for target in col..=hi {
        if let Some(other) = state[target] {
            if other.row == point.row && other.col == point.col {
                state[target] = None;
            }
        }
    }
    results.push(point);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_peaks(height: usize, width: usize, peaks: &[(usize, usize, f32)]) -> FlatTensor {
        let mut data = vec![0.0; height * width];
        for &(row, col, value) in peaks {
            data[row * width + col] = value;
        }
        FlatTensor::new(data, vec![1, height, width, 1])
    }

    #[test]
    fn test_single_peak_single_candidate() {
        for window in [1, 3, 5] {
            let tensor = map_with_peaks(16, 16, &[(7, 8, 0.9)]);
            let candidates = nms(&tensor, 0, window, Some(0.1));
            assert_eq!(candidates.len(), 1, "window={}", window);
            assert_eq!(candidates[0].row, 7);
            assert_eq!(candidates[0].col, 8);
            assert_eq!(candidates[0].value, 0.9);
        }
    }

    #[test]
    fn test_two_separated_peaks() {
        // 窓より十分離れた2ピーク
        let tensor = map_with_peaks(20, 20, &[(3, 3, 0.9), (15, 15, 0.8)]);
        let candidates = nms(&tensor, 0, 3, Some(0.1));
        assert_eq!(candidates.len(), 2);
        let mut cols: Vec<i32> = candidates.iter().map(|c| c.col).collect();
        cols.sort();
        assert_eq!(cols, vec![3, 15]);
    }

    #[test]
    fn test_nearby_smaller_peak_suppressed() {
        // 窓内の小さいピークは棄却される
        let tensor = map_with_peaks(16, 16, &[(7, 7, 0.9), (7, 9, 0.5)]);
        let candidates = nms(&tensor, 0, 3, Some(0.1));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].col, 7);
    }

    #[test]
    fn test_two_peaks_same_column_region() {
        // 同じ列で行方向に離れた2ピーク
        let tensor = map_with_peaks(16, 16, &[(2, 5, 1.0), (12, 5, 0.9)]);
        let candidates = nms(&tensor, 0, 3, Some(0.1));
        assert_eq!(candidates.len(), 2);
        let mut rows: Vec<i32> = candidates.iter().map(|c| c.row).collect();
        rows.sort();
        assert_eq!(rows, vec![2, 12]);
    }

    #[test]
    fn test_peak_near_bottom_edge_flushed() {
        // スキャン中に確定しないピークはflushで拾われる
        let tensor = map_with_peaks(16, 16, &[(15, 4, 0.7)]);
        let candidates = nms(&tensor, 0, 3, Some(0.1));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].row, 15);
    }

    #[test]
    fn test_min_score_filter() {
        let tensor = map_with_peaks(20, 20, &[(3, 3, 0.9), (15, 15, 0.05)]);
        let candidates = nms(&tensor, 0, 3, Some(0.1));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, 0.9);
    }

    #[test]
    fn test_no_threshold_keeps_background() {
        // 閾値なしだと平坦な背景も候補になりうる（元実装の挙動）
        let tensor = map_with_peaks(8, 8, &[(3, 3, 0.9)]);
        let candidates = nms(&tensor, 0, 3, None);
        assert!(candidates.iter().any(|c| c.value == 0.9));
    }
}
