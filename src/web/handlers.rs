use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState, Error};
use crate::models::{ProductView, TrackRequest};
use crate::monitor::CycleOutcome;
use crate::scheduler::ScanStats;
use crate::utils::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceCheckResponse {
    pub id: String,
    pub current_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupportedSitesResponse {
    pub sites: Vec<String>,
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductView>>>, Error> {
    match state.manager.list().await {
        Ok(products) => Ok(Json(ApiResponse::success(products))),
        Err(e) => {
            tracing::error!("Failed to list products: {}", e);
            Err(Error::internal("Failed to retrieve products"))
        }
    }
}

pub async fn track_product(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<ApiResponse<ProductView>>, Error> {
    match state.manager.track(request).await {
        Ok(product) => {
            tracing::info!("Created tracked product: {} ({})", product.sid, product.id);
            Ok(Json(ApiResponse::success(product)))
        }
        Err(AppError::DuplicateProduct { sid }) => {
            Err(Error::conflict(format!("Product already added: {}", sid)))
        }
        Err(e @ (AppError::UnsupportedSite { .. }
        | AppError::MalformedUrl(_)
        | AppError::Validation(_)
        | AppError::Fetch(_))) => {
            tracing::warn!("Rejected track request: {}", e);
            Err(ingestion_rejection(&state, e))
        }
        Err(e) => {
            tracing::error!("Failed to create tracked product: {}", e);
            Err(Error::internal("Failed to create product"))
        }
    }
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductView>>, Error> {
    match state.manager.find(&id).await {
        Ok(Some(product)) => Ok(Json(ApiResponse::success(product))),
        Ok(None) => Err(Error::not_found("Product")),
        Err(e) => {
            tracing::error!("Failed to get product {}: {}", id, e);
            Err(Error::internal("Failed to retrieve product"))
        }
    }
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, Error> {
    match state.manager.delete(&id).await {
        Ok(()) => {
            tracing::info!("Deleted tracked product: {}", id);
            Ok(Json(ApiResponse::success(())))
        }
        Err(AppError::NotFound { .. }) => Err(Error::not_found("Product")),
        Err(e) => {
            tracing::error!("Failed to delete product {}: {}", id, e);
            Err(Error::internal("Failed to delete product"))
        }
    }
}

/// Immediate price check for one product. Every extractor or network
/// failure collapses into one retry-later answer for the caller.
pub async fn check_product_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PriceCheckResponse>>, Error> {
    match state.manager.check_price(&id).await {
        Ok(price) => Ok(Json(ApiResponse::success(PriceCheckResponse {
            id,
            current_price: price,
        }))),
        Err(AppError::NotFound { .. }) => Err(Error::not_found("Product")),
        Err(e) => {
            tracing::warn!("Manual price check failed for {}: {}", id, e);
            Err(Error::unavailable("Try again in some time"))
        }
    }
}

pub async fn list_supported_sites(
    State(state): State<AppState>,
) -> Json<ApiResponse<SupportedSitesResponse>> {
    Json(ApiResponse::success(SupportedSitesResponse {
        sites: state.manager.supported_sites(),
    }))
}

pub async fn get_scan_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ScanStats>>, Error> {
    let scheduler = state.scheduler.lock().await;
    Ok(Json(ApiResponse::success(scheduler.stats().await)))
}

pub async fn run_scan_now(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CycleOutcome>>, Error> {
    let scheduler = state.scheduler.lock().await;
    match scheduler.run_cycle_now().await {
        Ok(outcome) => Ok(Json(ApiResponse::success(outcome))),
        Err(e) if e.to_string().contains("already running") => {
            tracing::warn!("Immediate scan rejected: {}", e);
            Err(Error::conflict("A scan cycle is already running"))
        }
        Err(e) => {
            tracing::error!("Immediate scan failed: {}", e);
            Err(Error::internal("Scan cycle failed"))
        }
    }
}

/// Ingestion rejections carry the supported-site list so the caller can
/// correct the submission.
fn ingestion_rejection(state: &AppState, err: AppError) -> Error {
    Error::bad_request_with_details(
        err.to_string(),
        serde_json::json!({
            "supported_sites": state.manager.supported_sites(),
        }),
    )
}
