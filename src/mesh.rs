//! 地域メッシュコードのコーデック。
//!
//! 区画の算出は「地域メッシュ統計の特質・沿革」
//! <https://www.stat.go.jp/data/mesh/pdf/gaiyo1.pdf> p.12 の手順に従う。
//! 1文字変数名（p, q, r, ...）も同資料に合わせている。

use std::fmt;

use crate::error::SemiDynaError;
use crate::model::GeodeticPoint;

// メッシュコードを定義できる経緯度の範囲
const LON_MIN: f64 = 100.0;
const LON_MAX: f64 = 180.0;
const LAT_MIN: f64 = 0.0;
const LAT_MAX: f64 = 200.0 / 3.0; // 1次メッシュの緯度区画が2桁に収まる上限

/// 第1次地域区画（約80km、4桁）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirstMesh(String);

/// 第2次地域区画（約10km、6桁）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecondaryMesh(String);

/// 基準地域メッシュ（約1km、8桁）。
/// セミダイナミック補正のパラメータはこのレベルで引く。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StandardMesh(String);

/// 2分の1地域メッシュ（約500m、9桁）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HalfMesh(String);

/// 4分の1地域メッシュ（約250m、10桁）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuarterMesh(String);

macro_rules! mesh_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

mesh_accessors!(FirstMesh);
mesh_accessors!(SecondaryMesh);
mesh_accessors!(StandardMesh);
mesh_accessors!(HalfMesh);
mesh_accessors!(QuarterMesh);

impl StandardMesh {
    /// 8桁の数字列だけを基準メッシュとして受け付ける
    pub fn parse(code: &str) -> Result<Self, SemiDynaError> {
        if code.len() != 8 {
            return Err(SemiDynaError::InvalidMeshCode {
                code: code.to_string(),
                reason: format!("expected 8 digits, got {} characters", code.len()),
            });
        }
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SemiDynaError::InvalidMeshCode {
                code: code.to_string(),
                reason: "contains a non-digit character".to_string(),
            });
        }
        Ok(Self(code.to_string()))
    }

    /// パラメータテーブルの添字に使う整数表現
    pub fn as_u32(&self) -> u32 {
        // parse() で数字8桁であることを検証済み
        self.0.bytes().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    }

    /// メッシュ区画の南西隅の経緯度を復元する。
    ///
    /// 復号に対応しているのは基準メッシュのみ。2分の1・4分の1メッシュの
    /// 復号は提供しない（`HalfMesh` / `QuarterMesh` には対応する操作が無い）。
    pub fn southwest_corner(&self) -> GeodeticPoint {
        let b = self.0.as_bytes();
        let dig = |i: usize| f64::from(b[i] - b'0');
        let lat = (dig(0) * 10.0 + dig(1)) * 2.0 / 3.0
            + dig(4) * 2.0 / 3.0 / 8.0
            + dig(6) * 2.0 / 3.0 / 8.0 / 10.0;
        let lon = (dig(2) * 10.0 + dig(3)) + 100.0 + dig(5) / 8.0 + dig(7) / 8.0 / 10.0;
        GeodeticPoint::new(lon, lat)
    }
}

/// 1回の符号化で得られる各階層のメッシュコード一式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshCodeSet {
    pub first: FirstMesh,
    pub secondary: SecondaryMesh,
    pub standard: StandardMesh,
    pub half: HalfMesh,
    pub quarter: QuarterMesh,
}

/// 10進経緯度から各階層のメッシュコードを算出する
pub fn encode(lon: f64, lat: f64) -> Result<MeshCodeSet, SemiDynaError> {
    if !(LON_MIN..LON_MAX).contains(&lon) {
        return Err(SemiDynaError::OutOfRange {
            axis: "longitude",
            value: lon,
            range: "100 <= lon < 180",
        });
    }
    if !(LAT_MIN..LAT_MAX).contains(&lat) {
        return Err(SemiDynaError::OutOfRange {
            axis: "latitude",
            value: lat,
            range: "0 <= lat < 66.67",
        });
    }

    // 緯度方向: 分単位で区画を細分していく
    let total_min = lat * 60.0;
    let p = (total_min / 40.0).floor();
    let a = total_min % 40.0;
    let q = (a / 5.0).floor();
    let b = a % 5.0;
    let c = b * 60.0;
    let r = (c / 30.0).floor();
    let d = c % 30.0;
    let s = (d / 15.0).floor();
    // 4分の1メッシュの緯度区画は秒単位の余り d ではなく分単位の余り b から求める
    let t = (b / 7.5).floor();

    // 経度方向: 度の小数部で区画を細分していく
    let u = lon.floor() as i64 - 100;
    let frac_min = (lon - lon.floor()) * 60.0;
    let v = (frac_min / 7.5).floor();
    let g = frac_min % 7.5;
    let gs = g * 60.0;
    let w = (gs / 45.0).floor();
    let h = gs % 45.0;
    let x = (h / 22.5).floor();
    let j = h % 22.5;
    let y = (j / 11.25).floor();

    // 2分の1・4分の1メッシュ内の位置（1〜4）
    let m = (s as u32) * 2 + (x as u32) + 1;
    let n = (t as u32) * 2 + (y as u32) + 1;

    let first = format!("{:02}{:02}", p as u32, u);
    let secondary = format!("{}{}{}", first, q as u32, v as u32);
    let standard = format!("{}{}{}", secondary, r as u32, w as u32);
    let half = format!("{}{}", standard, m);
    let quarter = format!("{}{}", half, n);

    Ok(MeshCodeSet {
        first: FirstMesh(first),
        secondary: SecondaryMesh(secondary),
        standard: StandardMesh(standard),
        half: HalfMesh(half),
        quarter: QuarterMesh(quarter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_mesh_codes() {
        // 東北地方の実測点による既知のコード
        let cases = [
            (140.5555, 40.001, "6040", "604004", "60400404", "604004041"),
            (140.74128, 40.82416, "6140", "614015", "61401589", "614015893"),
            (141.1592, 39.7002, "5941", "594141", "59414142", "594141422"),
            (140.8755, 38.2678, "5740", "574037", "57403720", "574037201"),
        ];
        for (lon, lat, first, secondary, standard, half) in cases {
            let mesh = encode(lon, lat).unwrap();
            assert_eq!(mesh.first.as_str(), first);
            assert_eq!(mesh.secondary.as_str(), secondary);
            assert_eq!(mesh.standard.as_str(), standard);
            assert_eq!(mesh.half.as_str(), half);
        }
    }

    #[test]
    fn test_encode_quarter_mesh() {
        let mesh = encode(140.5555, 40.001).unwrap();
        assert_eq!(mesh.quarter.as_str(), "6040040412");
    }

    #[test]
    fn test_encode_invariant_within_quarter_cell() {
        // 同じ4分の1メッシュに入る2点は全階層でコードが一致する
        let m1 = encode(140.5555, 40.001).unwrap();
        let m2 = encode(140.5550, 40.0005).unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_encode_out_of_range() {
        let west = encode(99.9, 40.0);
        assert!(matches!(
            west,
            Err(SemiDynaError::OutOfRange { axis: "longitude", .. })
        ));
        let east = encode(180.0, 40.0);
        assert!(east.is_err());
        let south = encode(140.0, -0.1);
        assert!(matches!(
            south,
            Err(SemiDynaError::OutOfRange { axis: "latitude", .. })
        ));
        let north = encode(140.0, 67.0);
        assert!(north.is_err());
    }

    #[test]
    fn test_parse_standard_mesh() {
        let mesh = StandardMesh::parse("61401589").unwrap();
        assert_eq!(mesh.as_u32(), 61401589);

        assert!(matches!(
            StandardMesh::parse("6140158"),
            Err(SemiDynaError::InvalidMeshCode { .. })
        ));
        assert!(matches!(
            StandardMesh::parse("614015890"),
            Err(SemiDynaError::InvalidMeshCode { .. })
        ));
        assert!(matches!(
            StandardMesh::parse("6140158a"),
            Err(SemiDynaError::InvalidMeshCode { .. })
        ));
    }

    #[test]
    fn test_southwest_corner() {
        let corner = StandardMesh::parse("60400404").unwrap().southwest_corner();
        assert!((corner.lon - 140.55).abs() < 1e-9);
        assert!((corner.lat - 40.0).abs() < 1e-9);

        let corner = StandardMesh::parse("61401589").unwrap().southwest_corner();
        assert!((corner.lon - 140.7375).abs() < 1e-9);
        assert!((corner.lat - 40.81666666666667).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_lands_inside_cell() {
        // 復号結果は元の点ではなく、その点が属する区画の南西隅になる
        let cell_lon = 45.0 / 3600.0; // 基準メッシュの経度幅
        let cell_lat = 30.0 / 3600.0; // 基準メッシュの緯度幅
        for (lon, lat) in [
            (140.5555, 40.001),
            (140.74128, 40.82416),
            (141.1592, 39.7002),
            (140.8755, 38.2678),
        ] {
            let corner = encode(lon, lat).unwrap().standard.southwest_corner();
            assert!(lon - corner.lon >= 0.0 && lon - corner.lon < cell_lon);
            assert!(lat - corner.lat >= 0.0 && lat - corner.lat < cell_lat);
        }
    }
}
