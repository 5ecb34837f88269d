use std::fmt;

use chrono::{Datelike, NaiveDateTime};

use crate::mesh::StandardMesh;

/// 10進経緯度の測地座標。東経・北緯が正。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeodeticPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// セミダイナミック補正の地殻変動量。
/// dx: 経度方向（秒）、dy: 緯度方向（秒）、dz: 高さ方向（m）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

/// 補間セルの四隅の位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    LowerLeft,
    LowerRight,
    UpperLeft,
    UpperRight,
}

/// 補正1回分だけ生成される、セル隅の記述子
#[derive(Debug, Clone)]
pub struct MeshDesign {
    pub corner: Corner,
    /// 経度（秒）
    pub lon_sec: f64,
    /// 緯度（秒）
    pub lat_sec: f64,
    pub mesh: StandardMesh,
}

/// 測量年度。4月1日から翌年3月31日まで。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiscalYear(i32);

impl FiscalYear {
    /// 観測日時から適用年度を求める。3月以前は前年度の扱いになる。
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        if dt.month() >= 4 {
            Self(dt.year())
        } else {
            Self(dt.year() - 1)
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for FiscalYear {
    fn from(year: i32) -> Self {
        Self(year)
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
