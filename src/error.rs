use thiserror::Error;

#[derive(Debug, Error)]
pub enum SemiDynaError {
    /// メッシュコードを定義できる範囲外の座標が指定された
    #[error("coordinate out of mesh domain: {axis} = {value} (valid range: {range})")]
    OutOfRange {
        axis: &'static str,
        value: f64,
        range: &'static str,
    },

    /// メッシュコード文字列が不正
    #[error("invalid mesh code '{code}': {reason}")]
    InvalidMeshCode { code: String, reason: String },

    /// 指定年度のパラメータファイルが存在しない
    #[error("no semi-dynamic parameter file for fiscal year {year}")]
    NoParameterFile { year: i32 },

    /// パラメータファイルの行が解釈できない
    #[error("malformed parameter file at line {line}: {reason}")]
    MalformedParameter { line: usize, reason: String },

    /// 補間に必要なメッシュのパラメータがテーブルに無い
    #[error("mesh code {mesh_code} not found in parameter table")]
    MissingParameter { mesh_code: u32 },

    /// バッチ補正がキャンセルされた
    #[error("batch correction cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
