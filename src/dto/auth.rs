use serde::{Deserialize, Serialize};

/// Claims issued by the external identity provider.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub exp: usize,
}
