use diesel::prelude::*;
use uuid::Uuid;

use crate::models::NewAdminActivity;
use crate::schema::admin_activities;
use crate::status::AdminActionType;

/// Appends an entry to the administrator audit log.
pub fn record(
    conn: &mut PgConnection,
    admin_user_id: Uuid,
    action: AdminActionType,
    target_type: &str,
    target_id: impl ToString,
    description: impl Into<String>,
    ip_address: Option<&str>,
) -> QueryResult<()> {
    let entry = NewAdminActivity {
        id: Uuid::new_v4(),
        admin_user_id,
        action_type: action.to_string(),
        target_type: target_type.to_string(),
        target_id: target_id.to_string(),
        description: description.into(),
        ip_address: ip_address.map(str::to_string),
    };

    diesel::insert_into(admin_activities::table)
        .values(&entry)
        .execute(conn)?;

    tracing::info!(
        admin_user_id = %admin_user_id,
        action = %action,
        target_type,
        target_id = %entry.target_id,
        "recorded admin activity"
    );
    Ok(())
}
