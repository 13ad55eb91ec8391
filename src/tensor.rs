use ndarray::ArrayViewD;

/// モデル出力テンソルのrow-majorビュー
///
/// 推論ランタイム（ort等）が返すフラットなf32バッファを形状付きで読む。
/// インデックスの不正（ランク不一致・範囲外）は設定ミスなのでpanicする。
#[derive(Debug, Clone)]
pub struct FlatTensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl FlatTensor {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "tensor data length {} does not match shape {:?}",
            data.len(),
            shape
        );
        Self { data, shape }
    }

    /// ndarrayのビューからコピーして構築（推論ランタイム境界用）
    pub fn from_array(array: ArrayViewD<f32>) -> Self {
        let shape = array.shape().to_vec();
        let data = array.iter().copied().collect();
        Self::new(data, shape)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// row-majorのフラットオフセットを計算
    fn flat_index(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.shape.len(),
            "invalid index: got rank {} for rank {}",
            index.len(),
            self.shape.len()
        );
        let mut result = 0;
        for (i, &idx) in index.iter().enumerate() {
            assert!(
                idx < self.shape[i],
                "invalid index: {} out of bounds for axis {} (size {})",
                idx,
                i,
                self.shape[i]
            );
            result = self.shape[i] * result + idx;
        }
        result
    }

    pub fn element(&self, index: &[usize]) -> f32 {
        self.data[self.flat_index(index)]
    }

    /// ヒートマップ読み出し (batch, row, col, channel) — [1, H, W, C] レイアウト
    pub fn heatmap(&self, batch: usize, row: usize, col: usize, channel: usize) -> f32 {
        self.element(&[batch, row, col, channel])
    }

    /// PAF読み出し — confidence枝のチャンネル数だけオフセットして後半の枝を読む
    pub fn paf(
        &self,
        batch: usize,
        row: usize,
        col: usize,
        channel: usize,
        channel_bias: usize,
    ) -> f32 {
        self.element(&[batch, row, col, channel + channel_bias])
    }

    /// チャンネルのボリューム [D, H, W] をコピーで取り出す（soft-argmax用）
    ///
    /// レイアウトは [1, K, D, H, W]。入力バッファは変更しない。
    pub fn volume_copy(&self, channel: usize) -> Vec<f32> {
        assert_eq!(
            self.shape.len(),
            5,
            "volumetric tensor must have rank 5, got {:?}",
            self.shape
        );
        let (depth, height, width) = (self.shape[2], self.shape[3], self.shape[4]);
        let volume = depth * height * width;
        assert!(
            channel < self.shape[1],
            "invalid channel: {} out of bounds (count {})",
            channel,
            self.shape[1]
        );
        let start = channel * volume;
        self.data[start..start + volume].to_vec()
    }
}
