use tracing::{info, warn};

use super::Db;
use super::models::UserRole;
use super::patch::{DeviceItemCreate, EquipmentCreate, LocationCreate, UserCreate};
use crate::config::AdminConfig;
use crate::error::CimsError;
use crate::utils::password::hash_password;

const PRIMARY_SITE: (&str, &str, &str) = ("Pune Data Center", "PUN-DC", "Pune, Maharashtra");
const DR_SITE: (&str, &str, &str) = ("DR Site", "DR-SITE", "Disaster Recovery Site");

const BRANCHES: [(&str, &str); 12] = [
    ("Pune", "PUN-BR"),
    ("Mumbai", "MUM-BR"),
    ("Thane", "THA-BR"),
    ("Amravati", "AMR-BR"),
    ("Sambhaji Nagar", "AUR-BR"),
    ("Chandrapur", "CHND-BR"),
    ("Ratnagiri", "RAT-BR"),
    ("Nashik", "NSK-BR"),
    ("Nanded", "NAD-BR"),
    ("Nagpur", "NAG-BR"),
    ("Kolhapur", "KOL-BR"),
    ("Dhule", "DHU-BR"),
];

/// The built-in site list: the primary DC, one branch per city, then the DR site.
pub fn default_locations() -> Vec<LocationCreate> {
    let site = |(name, code, address): (&str, &str, &str), kind: &str, is_primary: bool| {
        LocationCreate {
            name: name.to_string(),
            code: code.to_string(),
            kind: kind.to_string(),
            address: Some(address.to_string()),
            is_primary,
            is_active: true,
        }
    };

    let mut out = vec![site(PRIMARY_SITE, "DC", true)];
    out.extend(BRANCHES.iter().map(|(city, code)| LocationCreate {
        name: format!("{city} Branch"),
        code: (*code).to_string(),
        kind: "BR".to_string(),
        address: Some(format!("{city}, Maharashtra")),
        is_primary: false,
        is_active: true,
    }));
    out.push(site(DR_SITE, "DR", false));
    out
}

/// name, area, type, vendor, model, quantity, support email, support phone, support site, licensed
type SampleEquipment = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    &'static str,
    bool,
);

const SAMPLE_EQUIPMENT: [SampleEquipment; 7] = [
    ("Server Load Balancer", "Network", "Load Balancer", "Array Networks", "AVX 7900", "2",
     "support@arraynetworks.com", Some("+1-866-MY-ARRAY"), "https://support.arraynetworks.net", true),
    ("Web Application Firewall", "Security", "WAF", "Array Networks", "AVX 7900", "2",
     "support@arraynetworks.com", Some("+1-866-MY-ARRAY"), "https://support.arraynetworks.net", true),
    ("Primary & Secondary Firewall", "Security", "Firewall", "FortiNet", "FortiGate-1001F", "2",
     "support@fortinet.com", Some("+1-408-235-7700"), "https://support.fortinet.com", true),
    ("POE Switch", "Network", "Switch", "Netgear", "GS724TPv3", "57",
     "support@netgear.com", None, "https://www.netgear.com/support", false),
    ("Blade Server", "Compute", "Server", "Dell", "PowerEdge MX750c", "19",
     "support@dell.com", None, "https://www.dell.com/support", true),
    ("Unified Storage", "Compute", "Storage", "NetApp", "FAS 8700", "17",
     "support@netapp.com", None, "https://mysupport.netapp.com", true),
    ("Server Virtualization", "Application", "Virtualization", "Broadcom", "ESXi 8.03e", "N/A",
     "support@broadcom.com", None, "https://www.vmware.com/support", true),
];

/// device name, hostname, ip, model, version. All sit in the primary DC.
const SAMPLE_DC_DEVICES: [(&str, &str, &str, &str, &str); 6] = [
    ("Core Router 1", "FSL-DC-PUN-COR-RTR-01", "10.0.11.11", "iEdge 1000", "InfinityOS 1.4"),
    ("Core Router 2", "FSL-DC-PUN-COR-RTR-02", "10.0.11.12", "iEdge 1000", "InfinityOS 1.4"),
    ("Internet Router 1-TCL", "FSL-DC-PUN-INT-RTR-01", "10.0.11.13", "iEdge 1000", "InfinityOS 1.4"),
    ("Internet Router 2-JIO", "FSL-DC-PUN-INT-RTR-02", "10.0.11.14", "iEdge 1000", "InfinityOS 1.4"),
    ("DMZ Switch 1", "FSL-DC-PUN-DMZ-SW01", "10.0.11.21", "C93180YC-FX3H-Nexus 9000", "10.4(4)"),
    ("DMZ Switch 2", "FSL-DC-PUN-DMZ-SW02", "10.0.11.22", "C93180YC-FX3H-Nexus 9000", "10.4(4)"),
];

pub fn sample_equipment() -> Vec<EquipmentCreate> {
    SAMPLE_EQUIPMENT
        .iter()
        .map(
            |&(name, area, kind, vendor, model, quantity, email, phone, web_support, licensed)| {
                EquipmentCreate {
                    name: name.to_string(),
                    area: area.to_string(),
                    kind: kind.to_string(),
                    vendor: vendor.to_string(),
                    model: model.to_string(),
                    serial_number: None,
                    license_details: None,
                    quantity: quantity.to_string(),
                    sop_status: "Available".to_string(),
                    email: Some(email.to_string()),
                    phone: phone.map(str::to_string),
                    license_applicable: if licensed { "Yes" } else { "No" }.to_string(),
                    account_type: "AUTO".to_string(),
                    security_level: "LOW".to_string(),
                    web_support: Some(web_support.to_string()),
                    username: None,
                    credentials: None,
                    otp_required: None,
                    contact_person_otp: None,
                    validity: None,
                    contact_info: None,
                    contact_number: None,
                }
            },
        )
        .collect()
}

/// Sample DC network devices, placed at `location_id` when given.
pub fn sample_device_items(location_id: Option<i64>) -> Vec<DeviceItemCreate> {
    SAMPLE_DC_DEVICES
        .iter()
        .map(|&(device_name, hostname, ip, model, version)| DeviceItemCreate {
            device_name: device_name.to_string(),
            hostname: Some(hostname.to_string()),
            ip_address: Some(ip.to_string()),
            serial_number: None,
            category: "Network".to_string(),
            equipment_id: None,
            model: Some(model.to_string()),
            version: Some(version.to_string()),
            location_id,
            username: None,
            password: None,
            description: None,
            rack_position: None,
            status: "Active".to_string(),
            grafana_url: None,
            metric_group_id: None,
        })
        .collect()
}

impl Db {
    /// Create the configured admin when no user exists yet.
    pub async fn seed_admin(&self, admin: &AdminConfig) -> Result<(), CimsError> {
        if self.count_users().await? > 0 {
            return Ok(());
        }
        if admin.password.is_empty() {
            warn!(
                email = %admin.email,
                "No users exist and admin.password is empty; skipping admin seed"
            );
            return Ok(());
        }

        let id = self
            .create_user(UserCreate {
                email: admin.email.clone(),
                password_hash: hash_password(&admin.password),
                name: admin.name.clone(),
                role: UserRole::Admin,
            })
            .await?;
        info!(user_id = id, email = %admin.email, "Seeded admin user");
        Ok(())
    }

    /// Insert the default sites when the locations table is empty.
    pub async fn seed_locations(&self) -> Result<usize, CimsError> {
        if self.count_locations().await? > 0 {
            return Ok(0);
        }
        let sites = default_locations();
        let n = sites.len();
        for site in sites {
            self.create_location(site).await?;
        }
        info!(count = n, "Seeded default locations");
        Ok(n)
    }

    /// Insert demo equipment and DC devices. Each table is only filled when empty.
    /// Returns `(equipment, devices)` inserted.
    pub async fn seed_sample_inventory(&self) -> Result<(usize, usize), CimsError> {
        let equipment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipment")
            .fetch_one(self.pool())
            .await?;
        let mut equipment = 0;
        if equipment_count == 0 {
            for eq in sample_equipment() {
                self.create_equipment(eq).await?;
                equipment += 1;
            }
        }

        let device_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM device_items")
            .fetch_one(self.pool())
            .await?;
        let mut devices = 0;
        if device_count == 0 {
            let dc: Option<i64> = sqlx::query_scalar("SELECT id FROM locations WHERE code = ?")
                .bind(PRIMARY_SITE.1)
                .fetch_optional(self.pool())
                .await?;
            if dc.is_none() {
                warn!(code = PRIMARY_SITE.1, "Primary site missing; sample devices have no location");
            }
            let ids = self.create_device_items_bulk(sample_device_items(dc)).await?;
            devices = ids.len();
        }

        info!(equipment, devices, "Seeded sample inventory");
        Ok((equipment, devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sites_have_unique_codes() {
        let sites = default_locations();
        assert_eq!(sites.len(), 14);
        assert_eq!(sites[0].code, "PUN-DC");
        assert!(sites[0].is_primary);
        assert_eq!(sites.last().map(|s| s.kind.as_str()), Some("DR"));

        let mut codes: Vec<&str> = sites.iter().map(|s| s.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), sites.len());
    }

    #[test]
    fn sample_devices_carry_the_given_site() {
        let devices = sample_device_items(Some(1));
        assert!(devices.iter().all(|d| d.location_id == Some(1)));
        assert!(devices.iter().all(|d| d.password.is_none()));
        assert!(sample_device_items(None).iter().all(|d| d.location_id.is_none()));
        assert_eq!(sample_equipment()[3].license_applicable, "No");
    }
}
