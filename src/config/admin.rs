use serde::{Deserialize, Serialize};

/// Bootstrap administrator, created when the users table is empty.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// TOML: `admin.email`. Default: `admin@cims.local`.
    #[serde(default)]
    pub email: String,

    /// TOML: `admin.password`. Seeding is skipped while this is empty.
    #[serde(default)]
    pub password: String,

    /// TOML: `admin.name`. Default: `Administrator`.
    #[serde(default)]
    pub name: String,

    /// Insert the default data-center and branch sites into an empty locations table.
    #[serde(default = "default_true")]
    pub seed_locations: bool,

    /// TOML: `admin.seed_sample_inventory`. Demo equipment and DC devices for empty tables.
    /// Default: off.
    #[serde(default)]
    pub seed_sample_inventory: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@cims.local".to_string(),
            password: String::new(),
            name: "Administrator".to_string(),
            seed_locations: true,
            seed_sample_inventory: false,
        }
    }
}

fn default_true() -> bool {
    true
}
