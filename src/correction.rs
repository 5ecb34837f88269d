//! セミダイナミック補正。
//!
//! 測量成果の座標系（元期）とリアルタイムの地殻位置（今期）の間で、
//! 公開パラメータのバイリニア補間により座標を変換する。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::debug;

use crate::error::SemiDynaError;
use crate::mesh;
use crate::model::{Corner, Delta, FiscalYear, GeodeticPoint, MeshDesign};
use crate::parameter::{ParameterRepository, ParameterTable};

// パラメータグリッドの間隔（秒）
const LON_STEP_SEC: f64 = 225.0;
const LAT_STEP_SEC: f64 = 150.0;

/// バッチ補正を途中で打ち切るためのトークン。
/// キャンセル後も、処理済みの結果はそのまま有効。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 観測日時に対応する年度のパラメータでセミダイナミック補正を行う
pub struct SemiDynamicCorrector {
    fiscal_year: FiscalYear,
    table: Arc<ParameterTable>,
}

impl SemiDynamicCorrector {
    /// 観測日時から年度を決め、その年度のテーブルを取得する。
    /// パラメータファイルが無い年度は構築自体が失敗する。
    pub fn new(
        survey: NaiveDateTime,
        repository: &ParameterRepository,
    ) -> Result<Self, SemiDynaError> {
        let fiscal_year = FiscalYear::from_datetime(survey);
        let table = repository.table_for(fiscal_year)?;
        Ok(Self { fiscal_year, table })
    }

    pub fn fiscal_year(&self) -> FiscalYear {
        self.fiscal_year
    }

    // 補間セルの四隅を [ll, lr, ul, ur] の順で組み立てる
    fn design_cell(lon: f64, lat: f64) -> Result<[MeshDesign; 4], SemiDynaError> {
        let lon_sec = (lon * 3600.0 * 10.0).round() / 10.0;
        let lat_sec = (lat * 3600.0 * 10.0).round() / 10.0;
        // 左下隅はグリッド間隔の倍数に切り下げた位置
        let ll_lon_sec = (lon_sec / LON_STEP_SEC).floor() * LON_STEP_SEC;
        let ll_lat_sec = (lat_sec / LAT_STEP_SEC).floor() * LAT_STEP_SEC;

        let design = |corner: Corner,
                      offset_lon: f64,
                      offset_lat: f64|
         -> Result<MeshDesign, SemiDynaError> {
            let sec_lon = ll_lon_sec + offset_lon;
            let sec_lat = ll_lat_sec + offset_lat;
            let set = mesh::encode(sec_lon / 3600.0, sec_lat / 3600.0)?;
            Ok(MeshDesign {
                corner,
                lon_sec: sec_lon,
                lat_sec: sec_lat,
                mesh: set.standard,
            })
        };

        Ok([
            design(Corner::LowerLeft, 0.0, 0.0)?,
            design(Corner::LowerRight, LON_STEP_SEC, 0.0)?,
            design(Corner::UpperLeft, 0.0, LAT_STEP_SEC)?,
            design(Corner::UpperRight, LON_STEP_SEC, LAT_STEP_SEC)?,
        ])
    }

    fn delta_at(&self, design: &MeshDesign) -> Result<Delta, SemiDynaError> {
        let mesh_code = design.mesh.as_u32();
        self.table
            .get(mesh_code)
            .copied()
            .ok_or(SemiDynaError::MissingParameter { mesh_code })
    }

    /// 1点を補正する。
    /// `to_original_epoch` が真なら今期→元期、偽なら元期→今期の変換になる
    pub fn correct(
        &self,
        lon: f64,
        lat: f64,
        to_original_epoch: bool,
    ) -> Result<GeodeticPoint, SemiDynaError> {
        let [ll, lr, ul, ur] = Self::design_cell(lon, lat)?;
        debug!(
            "interpolation cell for ({}, {}): ll={} ur={}",
            lon,
            lat,
            ll.mesh.as_str(),
            ur.mesh.as_str()
        );

        // 四隅のうち1つでも欠けていたら補正は成立しない
        let delta_ll = self.delta_at(&ll)?;
        let delta_lr = self.delta_at(&lr)?;
        let delta_ul = self.delta_at(&ul)?;
        let delta_ur = self.delta_at(&ur)?;

        let lon_sec = lon * 3600.0;
        let lat_sec = lat * 3600.0;
        let x_norm = (lon_sec - ll.lon_sec) / (lr.lon_sec - ll.lon_sec);
        let y_norm = (lat_sec - ll.lat_sec) / (ul.lat_sec - ll.lat_sec);

        // バイリニア補間。重みの割り当ては公開実装のまま
        let mut delta_lon = (1.0 - y_norm) * (1.0 - x_norm) * delta_ll.dx
            + y_norm * (1.0 - x_norm) * delta_lr.dx
            + y_norm * x_norm * delta_ur.dx
            + (1.0 - y_norm) * x_norm * delta_ul.dx;
        let mut delta_lat = (1.0 - y_norm) * (1.0 - x_norm) * delta_ll.dy
            + y_norm * (1.0 - x_norm) * delta_lr.dy
            + y_norm * x_norm * delta_ur.dy
            + (1.0 - y_norm) * x_norm * delta_ul.dy;

        // 公開パラメータは元期→今期の変動量。今期→元期は符号を反転する
        if to_original_epoch {
            delta_lon = -delta_lon;
            delta_lat = -delta_lat;
        }

        Ok(GeodeticPoint::new(
            lon + delta_lon / 3600.0,
            lat + delta_lat / 3600.0,
        ))
    }

    /// 複数点を入力順のまま補正する。失敗した点は結果を詰めずに
    /// その位置に Err を返す
    pub fn correct_batch(
        &self,
        points: &[GeodeticPoint],
        to_original_epoch: bool,
    ) -> Vec<Result<GeodeticPoint, SemiDynaError>> {
        self.correct_batch_with_cancel(points, to_original_epoch, &CancellationToken::new())
    }

    /// キャンセル可能なバッチ補正。キャンセル以降の点は
    /// `SemiDynaError::Cancelled` になる
    pub fn correct_batch_with_cancel(
        &self,
        points: &[GeodeticPoint],
        to_original_epoch: bool,
        cancel: &CancellationToken,
    ) -> Vec<Result<GeodeticPoint, SemiDynaError>> {
        points
            .par_iter()
            .map(|point| {
                if cancel.is_cancelled() {
                    return Err(SemiDynaError::Cancelled);
                }
                self.correct(point.lon, point.lat, to_original_epoch)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_cell_corners() {
        let cell = SemiDynamicCorrector::design_cell(140.728905776, 40.832592069).unwrap();
        let [ll, lr, ul, ur] = cell;

        assert_eq!(ll.corner, Corner::LowerLeft);
        assert_eq!(ll.lon_sec, 506475.0);
        assert_eq!(ll.lat_sec, 146850.0);
        assert_eq!(ll.mesh.as_str(), "61401555");

        assert_eq!(lr.lon_sec, 506700.0);
        assert_eq!(lr.lat_sec, 146850.0);
        assert_eq!(lr.mesh.as_str(), "61401650");

        assert_eq!(ul.lon_sec, 506475.0);
        assert_eq!(ul.lat_sec, 147000.0);
        assert_eq!(ul.mesh.as_str(), "61402505");

        assert_eq!(ur.lon_sec, 506700.0);
        assert_eq!(ur.lat_sec, 147000.0);
        assert_eq!(ur.mesh.as_str(), "61402600");
    }

    #[test]
    fn test_design_cell_at_grid_corner() {
        // グリッド隅ちょうどの点は自身が左下隅になる
        let lon = 506475.0 / 3600.0;
        let lat = 146850.0 / 3600.0;
        let [ll, ..] = SemiDynamicCorrector::design_cell(lon, lat).unwrap();
        assert_eq!(ll.lon_sec, 506475.0);
        assert_eq!(ll.lat_sec, 146850.0);
    }

    #[test]
    fn test_design_cell_out_of_range() {
        assert!(SemiDynamicCorrector::design_cell(99.0, 40.0).is_err());
    }
}
