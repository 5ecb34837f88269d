//! セミダイナミック補正パラメータの読み込みとキャッシュ。
//!
//! パラメータファイルは国土地理院が年度ごとに公開するテキスト
//! （例: `SemiDyna2023.par`）。先頭15行が前書き、16行目が列ヘッダー、
//! 17行目以降が基準メッシュごとの変動量になっている。

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::SemiDynaError;
use crate::model::{Delta, FiscalYear};

// 前書きの行数。読み飛ばす
const PREAMBLE_LINES: usize = 15;

// 列ヘッダー名。dB=緯度、dL=経度、dH=楕円体高
const COL_MESH_CODE: &str = "MeshCode";
const COL_DELTA_LAT: &str = "dB(sec)";
const COL_DELTA_LON: &str = "dL(sec)";
const COL_DELTA_HEIGHT: &str = "dH(m)";

/// 年度を指定してパラメータファイルの本文を引き当てる
pub trait ParameterSource: Send + Sync {
    fn load(&self, year: FiscalYear) -> Result<String, SemiDynaError>;
}

/// ディレクトリからファイル名に西暦4桁を含むパラメータファイルを探す
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ParameterSource for DirectorySource {
    fn load(&self, year: FiscalYear) -> Result<String, SemiDynaError> {
        let needle = year.to_string();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.contains(&needle) {
                debug!("parameter file for FY{}: {:?}", year, entry.path());
                return Ok(fs::read_to_string(entry.path())?);
            }
        }
        Err(SemiDynaError::NoParameterFile { year: year.value() })
    }
}

/// 1年度分の補正パラメータ。構築後は読み取り専用
#[derive(Debug)]
pub struct ParameterTable {
    deltas: HashMap<u32, Delta>,
}

impl ParameterTable {
    /// パラメータファイルの本文からテーブルを構築する
    pub fn from_text(text: &str) -> Result<Self, SemiDynaError> {
        let mut lines = text.lines().enumerate().skip(PREAMBLE_LINES);

        let (header_idx, header) =
            lines.next().ok_or_else(|| SemiDynaError::MalformedParameter {
                line: PREAMBLE_LINES + 1,
                reason: "header line is missing".to_string(),
            })?;
        // 列の区切りは不揃いな空白。split_whitespace が空トークンを落とす
        let columns: Vec<&str> = header.split_whitespace().collect();
        let position = |name: &str| {
            columns
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| SemiDynaError::MalformedParameter {
                    line: header_idx + 1,
                    reason: format!("column '{}' is missing from header", name),
                })
        };
        let mesh_idx = position(COL_MESH_CODE)?;
        let lat_idx = position(COL_DELTA_LAT)?;
        let lon_idx = position(COL_DELTA_LON)?;
        let height_idx = position(COL_DELTA_HEIGHT)?;
        let last_idx = mesh_idx.max(lat_idx).max(lon_idx).max(height_idx);

        let mut deltas = HashMap::new();
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() <= last_idx {
                return Err(SemiDynaError::MalformedParameter {
                    line: idx + 1,
                    reason: format!(
                        "expected at least {} columns, got {}",
                        last_idx + 1,
                        fields.len()
                    ),
                });
            }
            let mesh_code: u32 =
                fields[mesh_idx]
                    .parse()
                    .map_err(|e| SemiDynaError::MalformedParameter {
                        line: idx + 1,
                        reason: format!("mesh code '{}': {}", fields[mesh_idx], e),
                    })?;
            let numeric = |col: usize| -> Result<f64, SemiDynaError> {
                fields[col]
                    .parse()
                    .map_err(|e| SemiDynaError::MalformedParameter {
                        line: idx + 1,
                        reason: format!("value '{}': {}", fields[col], e),
                    })
            };
            let delta = Delta {
                dx: numeric(lon_idx)?,
                dy: numeric(lat_idx)?,
                dz: numeric(height_idx)?,
            };
            deltas.insert(mesh_code, delta);
        }

        Ok(Self { deltas })
    }

    pub fn get(&self, mesh_code: u32) -> Option<&Delta> {
        self.deltas.get(&mesh_code)
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// 年度ごとのパラメータテーブルを遅延読み込みで保持するリポジトリ。
/// 一度読み込んだテーブルは Arc で共有し、以後変更しない。
pub struct ParameterRepository {
    source: Box<dyn ParameterSource>,
    cache: Mutex<HashMap<FiscalYear, Arc<ParameterTable>>>,
}

impl ParameterRepository {
    pub fn new(source: impl ParameterSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 指定年度のテーブルを返す。未読み込みならここで読み込む
    pub fn table_for(&self, year: FiscalYear) -> Result<Arc<ParameterTable>, SemiDynaError> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(table) = cache.get(&year) {
            return Ok(Arc::clone(table));
        }
        let text = self.source.load(year)?;
        let table = Arc::new(ParameterTable::from_text(&text)?);
        info!(
            "loaded semi-dynamic parameters for FY{}: {} mesh cells",
            year,
            table.len()
        );
        cache.insert(year, Arc::clone(&table));
        Ok(table)
    }
}
