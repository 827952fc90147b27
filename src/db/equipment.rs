use chrono::Utc;
use sqlx::types::Json;

use super::Db;
use super::models::{
    DbAttachment, DbEquipment, DbEquipmentListItem, DbManual, EquipmentBrief, EquipmentDetail,
};
use super::patch::{AttachmentCreate, EquipmentCreate, ManualUpsert};
use crate::error::CimsError;

const EQUIPMENT_COLUMNS: &str = "id, name, area, type, vendor, model, serial_number, license_details, \
     quantity, sop_status, email, phone, license_applicable, account_type, security_level, \
     web_support, username, credentials, otp_required, contact_person_otp, validity, \
     contact_info, contact_number, created_at, updated_at";

const MANUAL_COLUMNS: &str = "id, equipment_id, summary, monitoring, maintenance, troubleshooting, \
     links, illustration_prompt, image_url, created_at, updated_at";

const ATTACHMENT_COLUMNS: &str = "id, equipment_id, name, type, url, thumbnail, file_metadata, \
     upload_date, document_category, is_published";

/// Attachment types counted as documents vs. videos in the equipment list.
const DOC_TYPES: &str = "'pdf', 'docx', 'web'";
const VIDEO_TYPES: &str = "'video', 'youtube'";

impl Db {
    pub async fn list_equipment(&self) -> Result<Vec<DbEquipmentListItem>, CimsError> {
        let sql = format!(
            r#"
            SELECT
                e.id, e.name, e.area, e.type, e.vendor, e.model, e.quantity, e.sop_status,
                e.email, e.phone, e.account_type, e.security_level,
                (SELECT COUNT(*) FROM attachments a
                    WHERE a.equipment_id = e.id AND a.is_published = 1 AND a.type IN ({DOC_TYPES})) AS doc_count,
                (SELECT COUNT(*) FROM attachments a
                    WHERE a.equipment_id = e.id AND a.is_published = 1 AND a.type IN ({VIDEO_TYPES})) AS video_count,
                (SELECT MAX(a.upload_date) FROM attachments a
                    WHERE a.equipment_id = e.id AND a.is_published = 1) AS last_updated
            FROM equipment e
            ORDER BY e.id
            "#
        );
        let rows = sqlx::query_as::<_, DbEquipmentListItem>(&sql)
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    pub async fn find_equipment(&self, id: i64) -> Result<Option<DbEquipment>, CimsError> {
        let row = sqlx::query_as::<_, DbEquipment>(&format!(
            "SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_equipment(&self, id: i64) -> Result<DbEquipment, CimsError> {
        self.find_equipment(id)
            .await?
            .ok_or_else(|| CimsError::not_found("Equipment"))
    }

    pub async fn get_equipment_detail(&self, id: i64) -> Result<EquipmentDetail, CimsError> {
        let equipment = self.get_equipment(id).await?;
        let manual = self.find_manual(id).await?;
        let attachments = self.list_attachments(id).await?;
        Ok(EquipmentDetail {
            equipment,
            manual,
            attachments,
        })
    }

    /// Every equipment row, oldest first; feeds the chat prompt's inventory context.
    pub async fn list_equipment_for_context(&self) -> Result<Vec<DbEquipment>, CimsError> {
        let rows = sqlx::query_as::<_, DbEquipment>(&format!(
            "SELECT {EQUIPMENT_COLUMNS} FROM equipment ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn find_equipment_brief(&self, id: i64) -> Result<Option<EquipmentBrief>, CimsError> {
        let row = sqlx::query_as::<_, EquipmentBrief>(
            "SELECT id, name, vendor, model FROM equipment WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn create_equipment(&self, c: EquipmentCreate) -> Result<i64, CimsError> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO equipment (
                name, area, type, vendor, model, serial_number, license_details, quantity,
                sop_status, email, phone, license_applicable, account_type, security_level,
                web_support, username, credentials, otp_required, contact_person_otp, validity,
                contact_info, contact_number, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(c.name)
        .bind(c.area)
        .bind(c.kind)
        .bind(c.vendor)
        .bind(c.model)
        .bind(c.serial_number)
        .bind(c.license_details)
        .bind(c.quantity)
        .bind(c.sop_status)
        .bind(c.email)
        .bind(c.phone)
        .bind(c.license_applicable)
        .bind(c.account_type)
        .bind(c.security_level)
        .bind(c.web_support)
        .bind(c.username)
        .bind(c.credentials)
        .bind(c.otp_required)
        .bind(c.contact_person_otp)
        .bind(c.validity)
        .bind(c.contact_info)
        .bind(c.contact_number)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    /// Delete equipment; its manual and attachment rows go with it.
    ///
    /// Returns the URLs of the removed attachments so the caller can clean up files.
    pub async fn delete_equipment(&self, id: i64) -> Result<Vec<String>, CimsError> {
        let mut tx = self.pool().begin().await?;

        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM attachments WHERE equipment_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let res = sqlx::query("DELETE FROM equipment WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Equipment"));
        }

        tx.commit().await?;
        Ok(urls)
    }

    pub async fn find_manual(&self, equipment_id: i64) -> Result<Option<DbManual>, CimsError> {
        let row = sqlx::query_as::<_, DbManual>(&format!(
            "SELECT {MANUAL_COLUMNS} FROM manual_contents WHERE equipment_id = ?"
        ))
        .bind(equipment_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Insert or replace the manual and mark the equipment's SOP as available.
    pub async fn upsert_manual(
        &self,
        equipment_id: i64,
        manual: ManualUpsert,
    ) -> Result<DbManual, CimsError> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let res = sqlx::query("UPDATE equipment SET sop_status = 'Available', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(equipment_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Equipment"));
        }

        let row = sqlx::query_as::<_, DbManual>(&format!(
            r#"
            INSERT INTO manual_contents (
                equipment_id, summary, monitoring, maintenance, troubleshooting, links,
                illustration_prompt, image_url, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(equipment_id) DO UPDATE SET
                summary = excluded.summary,
                monitoring = excluded.monitoring,
                maintenance = excluded.maintenance,
                troubleshooting = excluded.troubleshooting,
                links = excluded.links,
                illustration_prompt = excluded.illustration_prompt,
                image_url = excluded.image_url,
                updated_at = excluded.updated_at
            RETURNING {MANUAL_COLUMNS}
            "#
        ))
        .bind(equipment_id)
        .bind(manual.summary)
        .bind(Json(manual.monitoring))
        .bind(Json(manual.maintenance))
        .bind(Json(manual.troubleshooting))
        .bind(manual.links.map(Json))
        .bind(manual.illustration_prompt)
        .bind(manual.image_url)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn list_attachments(&self, equipment_id: i64) -> Result<Vec<DbAttachment>, CimsError> {
        let rows = sqlx::query_as::<_, DbAttachment>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE equipment_id = ? ORDER BY upload_date DESC, id DESC"
        ))
        .bind(equipment_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_attachment(&self, id: i64) -> Result<DbAttachment, CimsError> {
        sqlx::query_as::<_, DbAttachment>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CimsError::not_found("Attachment"))
    }

    pub async fn create_attachment(&self, c: AttachmentCreate) -> Result<DbAttachment, CimsError> {
        let row = sqlx::query_as::<_, DbAttachment>(&format!(
            r#"
            INSERT INTO attachments (
                equipment_id, name, type, url, file_metadata, upload_date, document_category, is_published
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        ))
        .bind(c.equipment_id)
        .bind(c.name)
        .bind(c.kind)
        .bind(c.url)
        .bind(c.metadata.map(Json))
        .bind(Utc::now())
        .bind(c.document_category)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Flip `is_published` and return the new value.
    pub async fn toggle_attachment_published(&self, id: i64) -> Result<bool, CimsError> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE attachments SET is_published = NOT is_published WHERE id = ? RETURNING is_published",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CimsError::not_found("Attachment"))
    }

    pub async fn delete_attachment(&self, id: i64) -> Result<DbAttachment, CimsError> {
        let attachment = self.get_attachment(id).await?;
        sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(attachment)
    }
}
