pub mod correction;
pub mod error;
pub mod mesh;
pub mod model;
pub mod parameter;

pub use correction::{CancellationToken, SemiDynamicCorrector};
pub use error::SemiDynaError;
pub use mesh::{MeshCodeSet, StandardMesh};
pub use model::{Delta, FiscalYear, GeodeticPoint};
pub use parameter::{DirectorySource, ParameterRepository, ParameterSource, ParameterTable};
