//! # API REST
//!
//! REST API implementation for APR.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON wire models, CORS, status mapping)
//!
//! All domain behaviour lives in `apr-core`; handlers translate between the
//! wire models in [`dto`] and the typed domain API, and map `RecordError`
//! values onto HTTP statuses.

#![warn(rust_2018_idioms)]

pub mod dto;

use apr_core::{
    monthly_summaries, technique, AirwayDevice, BiologicalSex, BillingEntry, IdentityCorrection,
    NewPatient, NewProcedure, NonEmptyText, PatientService, PreAnaestheticEvaluation,
    ProcedureKind, ProcedureLive, ProcedureMutations, ProcedureService, ProcedureStatus,
    RecordError, RecordId, RecoveryRecord, SummaryFilter, SurgeryRecord, TechniqueKind,
    TechniqueSelection,
};
use apr_store::DocumentStore;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    AggregateRes, BillingEntryDto, CreatePatientReq, DerivedStatusRes, HealthRes,
    ListPatientsRes, ListProceduresRes, MonthlySummariesRes, MonthlySummaryRes, PatientRes,
    ProcedureRes, RegisterProcedureReq, SaveRecordReq, SetStatusReq, TechniqueReq, TechniqueRes,
    UpdatePatientReq, UpdateProcedureReq,
};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    patients: PatientService,
    procedures: ProcedureService,
    live: ProcedureLive,
}

impl AppState {
    /// Builds the handler state over an injected store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            patients: PatientService::new(store.clone()),
            procedures: ProcedureService::new(store.clone()),
            live: ProcedureLive::new(store.clone()),
            store,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        create_patient,
        get_patient,
        update_patient,
        list_procedures,
        register_procedure,
        procedure_aggregate,
        update_procedure,
        set_procedure_status,
        save_surgery,
        save_pre_anaesthetic,
        save_pacu,
        monthly_financial_summary,
        technique_description,
    ),
    components(schemas(
        HealthRes,
        PatientRes,
        ListPatientsRes,
        CreatePatientReq,
        UpdatePatientReq,
        BillingEntryDto,
        ProcedureRes,
        ListProceduresRes,
        RegisterProcedureReq,
        SetStatusReq,
        UpdateProcedureReq,
        SaveRecordReq,
        DerivedStatusRes,
        AggregateRes,
        MonthlySummaryRes,
        MonthlySummariesRes,
        TechniqueReq,
        TechniqueRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients))
        .route("/patients", post(create_patient))
        .route("/patients/:patient_id", get(get_patient))
        .route("/patients/:patient_id", put(update_patient))
        .route("/patients/:patient_id/procedures", get(list_procedures))
        .route("/patients/:patient_id/procedures", post(register_procedure))
        .route(
            "/patients/:patient_id/procedures/:procedure_id",
            get(procedure_aggregate),
        )
        .route(
            "/patients/:patient_id/procedures/:procedure_id",
            patch(update_procedure),
        )
        .route(
            "/patients/:patient_id/procedures/:procedure_id/status",
            put(set_procedure_status),
        )
        .route(
            "/patients/:patient_id/procedures/:procedure_id/surgery",
            put(save_surgery),
        )
        .route(
            "/patients/:patient_id/procedures/:procedure_id/pre-anaesthetic",
            put(save_pre_anaesthetic),
        )
        .route(
            "/patients/:patient_id/procedures/:procedure_id/pacu",
            put(save_pacu),
        )
        .route(
            "/patients/:patient_id/financial/monthly",
            get(monthly_financial_summary),
        )
        .route("/technique/description", post(technique_description))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type HandlerError = (StatusCode, String);

fn bad_request(message: impl Into<String>) -> HandlerError {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Maps a core error onto an HTTP status. Not-found and validation errors
/// keep their message; everything else is logged and reported generically.
fn record_error(err: RecordError) -> HandlerError {
    match &err {
        RecordError::PatientNotFound(_) | RecordError::ProcedureNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        RecordError::InvalidInput(_) | RecordError::InvalidIdentifier(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        _ => {
            tracing::error!("request failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

fn parse_id(value: &str) -> Result<RecordId, HandlerError> {
    RecordId::new(value).map_err(|e| bad_request(format!("invalid identifier: {e}")))
}

fn parse_name(value: &str) -> Result<NonEmptyText, HandlerError> {
    NonEmptyText::new(value).map_err(|e| bad_request(e.to_string()))
}

fn parse_birth_date(value: &str) -> Result<NaiveDate, HandlerError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| bad_request(format!("invalid birth_date '{value}', expected YYYY-MM-DD")))
}

fn parse_sex(value: &str) -> Result<BiologicalSex, HandlerError> {
    BiologicalSex::parse(value)
        .ok_or_else(|| bad_request(format!("invalid sex '{value}', expected female or male")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, HandlerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| bad_request(format!("invalid timestamp '{value}', expected RFC 3339")))
}

/// Parses a wire enum through its serde representation.
fn parse_wire<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_owned())).ok()
}

fn billing_entries(entries: Vec<BillingEntryDto>) -> Result<Vec<BillingEntry>, HandlerError> {
    entries
        .into_iter()
        .map(|entry| {
            Ok(BillingEntry {
                code: parse_name(&entry.code)?,
                description: entry.description,
                amount: entry.amount,
                paid: entry.paid,
            })
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer probes.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "APR REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = ListPatientsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Lists all patients in the system.
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
) -> Result<Json<ListPatientsRes>, HandlerError> {
    let patients = state.patients.list_patients().await.map_err(record_error)?;
    Ok(Json(ListPatientsRes {
        patients: patients.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 200, description = "Patient created", body = PatientRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Creates a new patient record (intake).
#[axum::debug_handler]
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<Json<PatientRes>, HandlerError> {
    let intake = NewPatient {
        name: parse_name(&req.name)?,
        birth_date: parse_birth_date(&req.birth_date)?,
        sex: parse_sex(&req.sex)?,
        health_card_number: req.health_card_number,
    };
    let patient = state
        .patients
        .create_patient(intake)
        .await
        .map_err(record_error)?;
    Ok(Json(patient.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "The patient", body = PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
/// Point-reads one patient.
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> Result<Json<PatientRes>, HandlerError> {
    let id = parse_id(&patient_id)?;
    let patient = state.patients.get_patient(&id).await.map_err(record_error)?;
    Ok(Json(patient.into()))
}

#[utoipa::path(
    put,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = UpdatePatientReq,
    responses(
        (status = 204, description = "Identity corrected"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
/// Applies an identity correction to a patient.
#[axum::debug_handler]
async fn update_patient(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
    Json(req): Json<UpdatePatientReq>,
) -> Result<StatusCode, HandlerError> {
    let id = parse_id(&patient_id)?;
    let correction = IdentityCorrection {
        name: req.name.as_deref().map(parse_name).transpose()?,
        birth_date: req.birth_date.as_deref().map(parse_birth_date).transpose()?,
        sex: req.sex.as_deref().map(parse_sex).transpose()?,
        health_card_number: req.health_card_number,
    };
    state
        .patients
        .correct_identity(&id, correction)
        .await
        .map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/procedures",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "The patient's procedures", body = ListProceduresRes)
    )
)]
/// Lists the procedures registered under a patient.
#[axum::debug_handler]
async fn list_procedures(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> Result<Json<ListProceduresRes>, HandlerError> {
    let id = parse_id(&patient_id)?;
    let procedures = state
        .procedures
        .list_for_patient(&id)
        .await
        .map_err(record_error)?;
    Ok(Json(ListProceduresRes {
        procedures: procedures.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{patient_id}/procedures",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = RegisterProcedureReq,
    responses(
        (status = 200, description = "Procedure registered", body = ProcedureRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
/// Registers a new procedure under a patient.
#[axum::debug_handler]
async fn register_procedure(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
    Json(req): Json<RegisterProcedureReq>,
) -> Result<Json<ProcedureRes>, HandlerError> {
    let id = parse_id(&patient_id)?;
    let kind = ProcedureKind::parse(&req.kind)
        .ok_or_else(|| bad_request(format!("invalid kind '{}'", req.kind)))?;
    let registration = NewProcedure {
        kind,
        hospital: parse_name(&req.hospital)?,
        surgeons: req
            .surgeons
            .iter()
            .map(|s| parse_name(s))
            .collect::<Result<_, _>>()?,
        billing: billing_entries(req.billing)?,
        description: req.description,
        scheduled_for: parse_timestamp(&req.scheduled_for)?,
    };
    let procedure = state
        .procedures
        .register(&id, registration)
        .await
        .map_err(record_error)?;
    Ok(Json(procedure.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/procedures/{procedure_id}",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    responses(
        (status = 200, description = "Settled aggregate view", body = AggregateRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Returns a settled snapshot of the procedure aggregate.
///
/// Subscribes, waits for the two root subscriptions to report once, renders
/// the aggregate and tears the subscription down again. Root errors are
/// reported inside the body (`error` field), matching how a live consumer
/// would see them.
#[axum::debug_handler]
async fn procedure_aggregate(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
) -> Result<Json<AggregateRes>, HandlerError> {
    let mut handle = state
        .live
        .subscribe(&patient_id, &procedure_id)
        .map_err(record_error)?;
    let aggregate = handle.settled().await;
    handle.shutdown();

    let encode = |err: serde_json::Error| -> HandlerError {
        tracing::error!("failed to encode aggregate: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
    };

    Ok(Json(AggregateRes {
        patient_id: aggregate.patient_id.to_string(),
        procedure_id: aggregate.procedure_id.to_string(),
        patient: aggregate
            .patient
            .map(serde_json::to_value)
            .transpose()
            .map_err(encode)?,
        procedure: aggregate
            .procedure
            .map(serde_json::to_value)
            .transpose()
            .map_err(encode)?,
        surgery: aggregate
            .surgery
            .map(serde_json::to_value)
            .transpose()
            .map_err(encode)?,
        pre_anaesthetic: aggregate
            .pre_anaesthetic
            .map(serde_json::to_value)
            .transpose()
            .map_err(encode)?,
        pacu: aggregate
            .pacu
            .map(serde_json::to_value)
            .transpose()
            .map_err(encode)?,
        loading: aggregate.loading,
        error: aggregate.error.map(|e| e.to_string()),
        status: aggregate.status.into(),
    }))
}

#[utoipa::path(
    patch,
    path = "/patients/{patient_id}/procedures/{procedure_id}",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    request_body = UpdateProcedureReq,
    responses(
        (status = 204, description = "Fields merged"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Procedure not found")
    )
)]
/// Merges fields into the procedure root, bumping the revision counter.
#[axum::debug_handler]
async fn update_procedure(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
    Json(req): Json<UpdateProcedureReq>,
) -> Result<StatusCode, HandlerError> {
    let serde_json::Value::Object(fields) = req.fields else {
        return Err(bad_request("fields must be a JSON object"));
    };
    let mutations = ProcedureMutations::new(state.store.clone(), &patient_id, &procedure_id)
        .map_err(record_error)?;
    mutations
        .update_procedure(fields)
        .await
        .map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/patients/{patient_id}/procedures/{procedure_id}/status",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    request_body = SetStatusReq,
    responses(
        (status = 204, description = "Status transitioned"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Procedure not found")
    )
)]
/// Transitions the procedure's lifecycle status.
#[axum::debug_handler]
async fn set_procedure_status(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
    Json(req): Json<SetStatusReq>,
) -> Result<StatusCode, HandlerError> {
    let status = ProcedureStatus::parse(&req.status)
        .ok_or_else(|| bad_request(format!("invalid status '{}'", req.status)))?;
    let mutations = ProcedureMutations::new(state.store.clone(), &patient_id, &procedure_id)
        .map_err(record_error)?;
    mutations.set_status(status).await.map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/patients/{patient_id}/procedures/{procedure_id}/surgery",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    request_body = SaveRecordReq,
    responses(
        (status = 204, description = "Record saved"),
        (status = 400, description = "Bad request")
    )
)]
/// Saves the intraoperative record (auto-save).
#[axum::debug_handler]
async fn save_surgery(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
    Json(req): Json<SaveRecordReq>,
) -> Result<StatusCode, HandlerError> {
    let record: SurgeryRecord = serde_json::from_value(req.record)
        .map_err(|e| bad_request(format!("invalid surgery record: {e}")))?;
    let mutations = ProcedureMutations::new(state.store.clone(), &patient_id, &procedure_id)
        .map_err(record_error)?;
    mutations.save_surgery(&record).await.map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/patients/{patient_id}/procedures/{procedure_id}/pre-anaesthetic",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    request_body = SaveRecordReq,
    responses(
        (status = 204, description = "Record saved"),
        (status = 400, description = "Bad request")
    )
)]
/// Saves the pre-anaesthetic evaluation.
#[axum::debug_handler]
async fn save_pre_anaesthetic(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
    Json(req): Json<SaveRecordReq>,
) -> Result<StatusCode, HandlerError> {
    let evaluation: PreAnaestheticEvaluation = serde_json::from_value(req.record)
        .map_err(|e| bad_request(format!("invalid pre-anaesthetic evaluation: {e}")))?;
    let mutations = ProcedureMutations::new(state.store.clone(), &patient_id, &procedure_id)
        .map_err(record_error)?;
    mutations
        .save_pre_anaesthetic(&evaluation)
        .await
        .map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/patients/{patient_id}/procedures/{procedure_id}/pacu",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("procedure_id" = String, Path, description = "Procedure identifier")
    ),
    request_body = SaveRecordReq,
    responses(
        (status = 204, description = "Record saved"),
        (status = 400, description = "Bad request")
    )
)]
/// Saves the post-anaesthesia recovery record.
#[axum::debug_handler]
async fn save_pacu(
    State(state): State<AppState>,
    AxumPath((patient_id, procedure_id)): AxumPath<(String, String)>,
    Json(req): Json<SaveRecordReq>,
) -> Result<StatusCode, HandlerError> {
    let record: RecoveryRecord = serde_json::from_value(req.record)
        .map_err(|e| bad_request(format!("invalid recovery record: {e}")))?;
    let mutations = ProcedureMutations::new(state.store.clone(), &patient_id, &procedure_id)
        .map_err(record_error)?;
    mutations.save_pacu(&record).await.map_err(record_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    insurance_only: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/financial/monthly",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("insurance_only" = Option<bool>, Query, description = "Restrict to insurance-billed procedures")
    ),
    responses(
        (status = 200, description = "Monthly billing totals", body = MonthlySummariesRes)
    )
)]
/// Folds the patient's procedures into monthly billing totals.
#[axum::debug_handler]
async fn monthly_financial_summary(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<MonthlySummariesRes>, HandlerError> {
    let id = parse_id(&patient_id)?;
    let procedures = state
        .procedures
        .list_for_patient(&id)
        .await
        .map_err(record_error)?;
    let summaries = monthly_summaries(
        &procedures,
        SummaryFilter {
            insurance_only: query.insurance_only.unwrap_or(false),
        },
    );
    Ok(Json(MonthlySummariesRes {
        months: summaries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/technique/description",
    request_body = TechniqueReq,
    responses(
        (status = 200, description = "Assembled description", body = TechniqueRes),
        (status = 400, description = "Bad request")
    )
)]
/// Assembles an anaesthesia technique description from the selected options.
#[axum::debug_handler]
async fn technique_description(
    State(_state): State<AppState>,
    Json(req): Json<TechniqueReq>,
) -> Result<Json<TechniqueRes>, HandlerError> {
    let kind: TechniqueKind = parse_wire(&req.kind)
        .ok_or_else(|| bad_request(format!("invalid technique kind '{}'", req.kind)))?;
    let airway: Option<AirwayDevice> = req
        .airway
        .as_deref()
        .map(|value| {
            parse_wire(value).ok_or_else(|| bad_request(format!("invalid airway '{value}'")))
        })
        .transpose()?;

    let selection = TechniqueSelection {
        kind,
        airway,
        induction_agents: req
            .induction_agents
            .iter()
            .map(|s| parse_name(s))
            .collect::<Result<_, _>>()?,
        maintenance_agent: req.maintenance_agent.as_deref().map(parse_name).transpose()?,
        local_anaesthetic: req
            .local_anaesthetic
            .as_deref()
            .map(parse_name)
            .transpose()?,
        puncture_level: req.puncture_level.as_deref().map(parse_name).transpose()?,
    };

    Ok(Json(TechniqueRes {
        description: technique::describe(&selection),
    }))
}
