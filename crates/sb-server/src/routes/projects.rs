use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use sb_common::api::{
    AgentEntry, CreateProjectRequest, TeamMemberEntry, UpdateCommissionRequest,
    UpdateProjectRequest, UpdateTeamMemberRequest,
};
use sb_common::error::{AppError, AppResult};
use sb_common::split::check_contribution;
use sb_common::types::{
    CommissionRecord, ContributionType, ProjectRecord, ProjectStatus, TeamMemberRecord,
};
use sb_common::validation::ValidationErrors;
use serde::Deserialize;

use super::{parse_enum, parse_id};
use crate::state::AppState;
use crate::stores::client::ClientStore;
use crate::stores::project::{NewProject, NewTeamMember, ProjectStore};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub client_id: Option<String>,
    pub status: Option<String>,
}

pub async fn list(
    Query(query): Query<ProjectQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProjectRecord>>> {
    let client_id = query
        .client_id
        .as_deref()
        .map(|raw| parse_id(raw, "client"))
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(|raw| parse_enum("status", raw, ProjectStatus::parse, ProjectStatus::expected()))
        .transpose()?;

    let projects = ProjectStore::new(state.db_pool.clone())
        .list(client_id, status)
        .await?;
    Ok(Json(projects))
}

pub async fn get(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<ProjectRecord>> {
    let project_id = parse_id(&project_id, "project")?;
    let project = ProjectStore::new(state.db_pool.clone())
        .require(project_id)
        .await?;
    Ok(Json(project))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectRecord>)> {
    let mut errors = ValidationErrors::new();
    errors.require_non_blank("name", &payload.name);
    errors.into_result(())?;

    let status = match payload.status.as_deref() {
        Some(raw) => parse_enum("status", raw, ProjectStatus::parse, ProjectStatus::expected())?,
        None => ProjectStatus::Active,
    };

    ClientStore::new(state.db_pool.clone())
        .require(payload.client_id)
        .await?;

    let project = ProjectStore::new(state.db_pool.clone())
        .create(&NewProject {
            client_id: payload.client_id,
            name: payload.name.trim().to_string(),
            description: payload.description,
            status,
            deadline: payload.deadline,
        })
        .await?;
    tracing::info!(project_id = %project.project_id, client_id = %project.client_id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<Json<ProjectRecord>> {
    let project_id = parse_id(&project_id, "project")?;
    let store = ProjectStore::new(state.db_pool.clone());
    let mut project = store.require(project_id).await?;

    if let Some(name) = payload.name {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("name", &name);
        errors.into_result(())?;
        project.name = name.trim().to_string();
    }
    if let Some(raw) = payload.status.as_deref() {
        project.status = parse_enum("status", raw, ProjectStatus::parse, ProjectStatus::expected())?;
    }
    if let Some(client_id) = payload.client_id {
        ClientStore::new(state.db_pool.clone())
            .require(client_id)
            .await?;
        project.client_id = client_id;
    }
    if payload.description.is_some() {
        project.description = payload.description;
    }
    if payload.deadline.is_some() {
        project.deadline = payload.deadline;
    }

    let project = store.update(&project).await?;
    Ok(Json(project))
}

pub async fn delete(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let project_id = parse_id(&project_id, "project")?;
    ProjectStore::new(state.db_pool.clone())
        .delete(project_id)
        .await?;
    tracing::info!(project_id = %project_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_team_members(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TeamMemberRecord>>> {
    let project_id = parse_id(&project_id, "project")?;
    let store = ProjectStore::new(state.db_pool.clone());
    store.require(project_id).await?;
    Ok(Json(store.list_team_members(project_id).await?))
}

fn team_member_from_entry(entry: &TeamMemberEntry) -> AppResult<NewTeamMember> {
    let mut errors = ValidationErrors::new();
    let contribution_type = ContributionType::parse(&entry.contribution_type);
    if contribution_type.is_none() {
        errors.push(
            "contribution_type",
            format!(
                "must be one of {}, got {:?}",
                ContributionType::expected(),
                entry.contribution_type
            ),
        );
    }
    check_contribution(&mut errors, "contribution", contribution_type, entry.contribution);

    match contribution_type {
        Some(contribution_type) if errors.is_empty() => Ok(NewTeamMember {
            user_id: entry.user_id,
            role: entry.role.clone(),
            contribution_type,
            contribution: entry.contribution,
        }),
        _ => Err(errors.into()),
    }
}

pub async fn add_team_member(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<TeamMemberEntry>,
) -> AppResult<(StatusCode, Json<TeamMemberRecord>)> {
    let project_id = parse_id(&project_id, "project")?;
    let member = team_member_from_entry(&payload)?;

    let store = ProjectStore::new(state.db_pool.clone());
    store.require(project_id).await?;
    let record = store.add_team_member(project_id, &member).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_team_member(
    Path(member_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTeamMemberRequest>,
) -> AppResult<Json<TeamMemberRecord>> {
    let member_id = parse_id(&member_id, "team member")?;
    let store = ProjectStore::new(state.db_pool.clone());
    let mut member = store.require_team_member(member_id).await?;

    if let Some(raw) = payload.contribution_type.as_deref() {
        member.contribution_type = parse_enum(
            "contribution_type",
            raw,
            ContributionType::parse,
            ContributionType::expected(),
        )?;
    }
    if let Some(contribution) = payload.contribution {
        member.contribution = contribution;
    }
    if payload.user_id.is_some() {
        member.user_id = payload.user_id;
    }
    if payload.role.is_some() {
        member.role = payload.role;
    }

    // Type and amount are checked as merged.
    let mut errors = ValidationErrors::new();
    check_contribution(
        &mut errors,
        "contribution",
        Some(member.contribution_type),
        member.contribution,
    );
    errors.into_result(())?;

    Ok(Json(store.update_team_member(&member).await?))
}

pub async fn delete_team_member(
    Path(member_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let member_id = parse_id(&member_id, "team member")?;
    ProjectStore::new(state.db_pool.clone())
        .delete_team_member(member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn check_agent(agent_name: &str, rate: Decimal) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    errors.require_non_blank("agent_name", agent_name);
    errors.require_percentage("rate", rate);
    Ok(errors.into_result(())?)
}

pub async fn get_commission(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<CommissionRecord>> {
    let project_id = parse_id(&project_id, "project")?;
    let store = ProjectStore::new(state.db_pool.clone());
    store.require(project_id).await?;
    store
        .get_commission(project_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("commission"))
}

pub async fn create_commission(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AgentEntry>,
) -> AppResult<(StatusCode, Json<CommissionRecord>)> {
    let project_id = parse_id(&project_id, "project")?;
    check_agent(&payload.agent_name, payload.rate)?;

    let store = ProjectStore::new(state.db_pool.clone());
    store.require(project_id).await?;
    let commission = store
        .create_commission(project_id, payload.agent_name.trim(), payload.rate)
        .await?;
    tracing::info!(project_id = %project_id, rate = %commission.rate, "commission created");
    Ok((StatusCode::CREATED, Json(commission)))
}

pub async fn update_commission(
    Path(commission_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCommissionRequest>,
) -> AppResult<Json<CommissionRecord>> {
    let commission_id = parse_id(&commission_id, "commission")?;
    let store = ProjectStore::new(state.db_pool.clone());
    let mut commission = store
        .get_commission_by_id(commission_id)
        .await?
        .ok_or_else(|| AppError::not_found("commission"))?;

    if let Some(agent_name) = payload.agent_name {
        commission.agent_name = agent_name.trim().to_string();
    }
    if let Some(rate) = payload.rate {
        commission.rate = rate;
    }
    check_agent(&commission.agent_name, commission.rate)?;

    Ok(Json(store.update_commission(&commission).await?))
}

pub async fn delete_commission(
    Path(commission_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let commission_id = parse_id(&commission_id, "commission")?;
    ProjectStore::new(state.db_pool.clone())
        .delete_commission(commission_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
