//! Tenant behaviour certificate
//!
//! Aggregates a tenant's contracts, payments, incidents and evaluations into
//! a printable report. Built certificates are cached per tenant and dropped
//! whenever one of those inputs changes.

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::evaluations::{ensure_can_view_tenant, tenant_evaluations};
use crate::paths;
use crate::payments::payments_of;
use crate::repo;
use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use sara_domain::{
    Clp, Contract, ContractId, ContractStatus, Evaluation, EvaluationScores, Incident,
    IncidentStatus, PaymentStatus, Role, UserId,
};
use sara_mail::templates::escape_html;
use sara_store::Query;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

const CACHE_CAPACITY: u64 = 1_000;

/// Overall rating bucket derived from the evaluation average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Average of at least 4.5
    Excelente,
    /// Average of at least 3.5
    Bueno,
    /// Average of at least 2.5
    Regular,
    /// Below 2.5
    Deficiente,
    /// No completed evaluation
    SinEvaluaciones,
}

impl Classification {
    /// Bucket for an overall average
    #[must_use]
    pub fn from_average(average: Option<f64>) -> Self {
        match average {
            None => Self::SinEvaluaciones,
            Some(a) if a >= 4.5 => Self::Excelente,
            Some(a) if a >= 3.5 => Self::Bueno,
            Some(a) if a >= 2.5 => Self::Regular,
            Some(_) => Self::Deficiente,
        }
    }

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Excelente => "Excelente",
            Self::Bueno => "Bueno",
            Self::Regular => "Regular",
            Self::Deficiente => "Deficiente",
            Self::SinEvaluaciones => "Sin evaluaciones",
        }
    }
}

/// Who the certificate is about
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantInfo {
    /// Tenant uid
    pub id: UserId,
    /// Full name
    pub name: String,
    /// Email
    pub email: String,
    /// Formatted RUT
    pub rut: Option<String>,
    /// Phone
    pub phone: Option<String>,
}

/// One rental in the tenant's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractLine {
    /// Contract id
    pub id: ContractId,
    /// Property
    pub property_name: String,
    /// Landlord
    pub landlord_name: String,
    /// Term start
    pub start_date: NaiveDate,
    /// Term end
    pub end_date: NaiveDate,
    /// Monthly rent
    pub rent: Clp,
    /// Status
    pub status: ContractStatus,
}

/// Rental history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSummary {
    /// Active and finalized contracts
    pub total: usize,
    /// Currently active
    pub active: usize,
    /// Finalized
    pub finalized: usize,
    /// Contracts, most recent start first
    pub entries: Vec<ContractLine>,
}

/// Payment behaviour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    /// Every declaration
    pub declared: usize,
    /// Accepted by the landlord
    pub accepted: usize,
    /// Rejected by the landlord
    pub rejected: usize,
    /// Awaiting review
    pub pending: usize,
    /// Accepted and paid by the due date
    pub on_time: usize,
    /// `on_time / accepted`, when anything was accepted
    pub on_time_ratio: Option<f64>,
}

/// Incident counts by status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    /// Reported
    pub total: usize,
    /// Not yet handled
    pub pending: usize,
    /// Being handled
    pub in_progress: usize,
    /// Closed
    pub resolved: usize,
}

/// Average score of one criterion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionAverage {
    /// Criterion key
    pub criterion: &'static str,
    /// Mean score
    pub average: f64,
}

/// Evaluation averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Completed evaluations
    pub count: usize,
    /// Per-criterion means (empty without evaluations)
    pub criteria: Vec<CriterionAverage>,
    /// Mean of the criterion means
    pub overall: Option<f64>,
    /// Landlord comments, newest first
    pub comments: Vec<String>,
}

/// Aggregated tenant history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantCertificate {
    /// Tenant identity
    pub tenant: TenantInfo,
    /// Rentals
    pub contracts: ContractSummary,
    /// Payments across those rentals
    pub payments: PaymentSummary,
    /// Incidents reported
    pub incidents: IncidentSummary,
    /// Landlord evaluations
    pub evaluations: EvaluationSummary,
    /// Overall bucket
    pub classification: Classification,
    /// Build time
    pub generated_at: DateTime<Utc>,
}

/// Per-tenant cache of built certificates
#[derive(Debug, Clone)]
pub struct CertificateCache {
    inner: Cache<UserId, Arc<TenantCertificate>>,
}

impl CertificateCache {
    /// Cache whose entries live for `ttl`
    #[inline]
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached certificate for `tenant`
    pub async fn get(&self, tenant: &UserId) -> Option<Arc<TenantCertificate>> {
        self.inner.get(tenant).await
    }

    /// Store a built certificate
    pub async fn insert(&self, certificate: Arc<TenantCertificate>) {
        self.inner.insert(certificate.tenant.id.clone(), certificate).await;
    }

    /// Drop the entry for `tenant`
    pub async fn invalidate(&self, tenant: &UserId) {
        self.inner.invalidate(tenant).await;
    }
}

/// Certificate service
#[derive(Debug, Clone)]
pub struct CertificateService {
    ctx: Arc<Context>,
}

impl CertificateService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Certificate for `tenant_id`, from cache when fresh
    ///
    /// # Errors
    /// `Forbidden` for landlords without a contract with this tenant,
    /// `NotFound` when `tenant_id` is not a tenant
    pub async fn build(&self, principal: &Principal, tenant_id: &UserId) -> Result<Arc<TenantCertificate>, SaraError> {
        ensure_can_view_tenant(&self.ctx, principal, tenant_id).await?;
        if let Some(cached) = self.ctx.certificates.get(tenant_id).await {
            return Ok(cached);
        }
        let certificate = Arc::new(self.assemble(tenant_id).await?);
        self.ctx.certificates.insert(Arc::clone(&certificate)).await;
        tracing::info!(tenant = %tenant_id, classification = certificate.classification.label(), "Certificate built");
        Ok(certificate)
    }

    /// Printable HTML certificate for `tenant_id`
    ///
    /// # Errors
    /// Same as [`Self::build`]
    pub async fn html(&self, principal: &Principal, tenant_id: &UserId) -> Result<String, SaraError> {
        Ok(render_html(&*self.build(principal, tenant_id).await?))
    }

    async fn assemble(&self, tenant_id: &UserId) -> Result<TenantCertificate, SaraError> {
        let profile = self.ctx.require_profile(tenant_id).await?;
        if profile.role != Role::Inquilino {
            return Err(SaraError::not_found("tenant", tenant_id));
        }
        let query = Query::collection(paths::CONTRACTS)
            .where_eq("tenant_id", tenant_id.as_str())
            .where_in("status", [ContractStatus::Activo.as_str(), ContractStatus::Finalizado.as_str()]);
        let contracts: Vec<Contract> = repo::find_values(self.ctx.store(), &query).await?;
        let payments = payments_of(&self.ctx, &contracts).await?;
        let incidents: Vec<Incident> = repo::find_values(
            self.ctx.store(),
            &Query::collection(paths::INCIDENTS).where_eq("tenant_id", tenant_id.as_str()),
        )
        .await?;
        let evaluations = tenant_evaluations(&self.ctx, tenant_id).await?;

        let mut payment_summary = PaymentSummary {
            declared: payments.len(),
            accepted: 0,
            rejected: 0,
            pending: 0,
            on_time: 0,
            on_time_ratio: None,
        };
        for (contract_id, payment) in &payments {
            match payment.status {
                PaymentStatus::Aceptado => {
                    payment_summary.accepted += 1;
                    let on_time = contracts
                        .iter()
                        .find(|c| c.id == *contract_id)
                        .is_some_and(|c| payment.is_on_time(c));
                    if on_time {
                        payment_summary.on_time += 1;
                    }
                }
                PaymentStatus::Rechazado => payment_summary.rejected += 1,
                PaymentStatus::Pendiente => payment_summary.pending += 1,
            }
        }
        if payment_summary.accepted > 0 {
            payment_summary.on_time_ratio = Some(ratio(payment_summary.on_time, payment_summary.accepted));
        }

        let evaluations = summarize_evaluations(&evaluations);
        Ok(TenantCertificate {
            tenant: TenantInfo {
                id: profile.id,
                name: profile.name,
                email: profile.email,
                rut: profile.rut.map(|r| r.to_string()),
                phone: profile.phone,
            },
            contracts: summarize_contracts(&contracts),
            payments: payment_summary,
            incidents: summarize_incidents(&incidents),
            classification: Classification::from_average(evaluations.overall),
            evaluations,
            generated_at: self.ctx.now(),
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(n: usize) -> f64 {
    n as f64
}

fn ratio(part: usize, whole: usize) -> f64 {
    as_f64(part) / as_f64(whole)
}

fn summarize_contracts(contracts: &[Contract]) -> ContractSummary {
    let mut entries: Vec<ContractLine> = contracts
        .iter()
        .map(|c| ContractLine {
            id: c.id,
            property_name: c.property_name.clone(),
            landlord_name: c.landlord_name.clone(),
            start_date: c.start_date,
            end_date: c.end_date,
            rent: c.rent,
            status: c.status,
        })
        .collect();
    entries.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    ContractSummary {
        total: entries.len(),
        active: entries.iter().filter(|e| e.status == ContractStatus::Activo).count(),
        finalized: entries.iter().filter(|e| e.status == ContractStatus::Finalizado).count(),
        entries,
    }
}

fn summarize_incidents(incidents: &[Incident]) -> IncidentSummary {
    let count = |status: IncidentStatus| incidents.iter().filter(|i| i.status == status).count();
    IncidentSummary {
        total: incidents.len(),
        pending: count(IncidentStatus::Pendiente),
        in_progress: count(IncidentStatus::EnProceso),
        resolved: count(IncidentStatus::Resuelto),
    }
}

/// Per-criterion and overall averages over completed evaluations
pub(crate) fn summarize_evaluations(evaluations: &[Evaluation]) -> EvaluationSummary {
    let scored: Vec<&EvaluationScores> = evaluations.iter().filter_map(|e| e.scores.as_ref()).collect();
    let comments = evaluations.iter().filter_map(|e| e.comment.clone()).collect();
    if scored.is_empty() {
        return EvaluationSummary {
            count: 0,
            criteria: Vec::new(),
            overall: None,
            comments,
        };
    }
    let criteria: Vec<CriterionAverage> = (0..4)
        .map(|i| {
            let total: u32 = scored.iter().map(|s| u32::from(s.criteria()[i].1)).sum();
            CriterionAverage {
                criterion: scored[0].criteria()[i].0,
                average: f64::from(total) / as_f64(scored.len()),
            }
        })
        .collect();
    let overall = criteria.iter().map(|c| c.average).sum::<f64>() / 4.0;
    EvaluationSummary {
        count: scored.len(),
        criteria,
        overall: Some(overall),
        comments,
    }
}

fn criterion_label(key: &str) -> &str {
    match key {
        "payment_punctuality" => "Puntualidad en los pagos",
        "property_care" => "Cuidado de la propiedad",
        "communication" => "Comunicación",
        "rule_compliance" => "Cumplimiento de normas",
        other => other,
    }
}

/// Self-contained printable HTML
#[must_use]
pub fn render_html(cert: &TenantCertificate) -> String {
    let t = &cert.tenant;
    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>Certificado de arrendatario - {name}</title>
<style>
body {{ font-family: Arial, Helvetica, sans-serif; color: #1f2933; margin: 32px; }}
h1 {{ color: #1d4ed8; margin-bottom: 4px; }}
h2 {{ border-bottom: 1px solid #cbd2d9; padding-bottom: 4px; margin-top: 28px; }}
table {{ width: 100%; border-collapse: collapse; }}
th, td {{ text-align: left; padding: 6px 8px; border-bottom: 1px solid #e4e7eb; }}
.badge {{ display: inline-block; padding: 6px 14px; border-radius: 14px; background: #e0e8f9; font-weight: bold; }}
.muted {{ color: #7b8794; font-size: 12px; }}
@media print {{ body {{ margin: 0; }} .no-print {{ display: none; }} h2 {{ page-break-after: avoid; }} }}
</style>
</head>
<body>
<h1>Certificado de comportamiento de arrendatario</h1>
<p class="muted">Emitido el {issued} por S.A.R.A.</p>
<h2>Arrendatario</h2>
<table>
<tr><th>Nombre</th><td>{name}</td></tr>
<tr><th>RUT</th><td>{rut}</td></tr>
<tr><th>Correo</th><td>{email}</td></tr>
<tr><th>Teléfono</th><td>{phone}</td></tr>
</table>
<h2>Calificación</h2>
<p><span class="badge">{class}</span> {overall}</p>
"#,
        name = escape_html(&t.name),
        issued = cert.generated_at.format("%d-%m-%Y"),
        rut = escape_html(t.rut.as_deref().unwrap_or("-")),
        email = escape_html(&t.email),
        phone = escape_html(t.phone.as_deref().unwrap_or("-")),
        class = cert.classification.label(),
        overall = cert
            .evaluations
            .overall
            .map_or_else(String::new, |o| format!("Promedio general {o:.2} de 5")),
    );

    html.push_str("<h2>Evaluaciones</h2>\n");
    if cert.evaluations.criteria.is_empty() {
        html.push_str("<p>El arrendatario aún no tiene evaluaciones completadas.</p>\n");
    } else {
        let _ = writeln!(html, "<p>{} evaluaciones completadas.</p>\n<table>", cert.evaluations.count);
        for c in &cert.evaluations.criteria {
            let _ = writeln!(html, "<tr><th>{}</th><td>{:.2}</td></tr>", criterion_label(c.criterion), c.average);
        }
        html.push_str("</table>\n");
        for comment in &cert.evaluations.comments {
            let _ = writeln!(html, "<blockquote>{}</blockquote>", escape_html(comment));
        }
    }

    let p = &cert.payments;
    let _ = write!(
        html,
        "<h2>Pagos</h2>\n<table>\n\
         <tr><th>Declarados</th><td>{}</td></tr>\n\
         <tr><th>Aceptados</th><td>{}</td></tr>\n\
         <tr><th>Rechazados</th><td>{}</td></tr>\n\
         <tr><th>Pendientes de revisión</th><td>{}</td></tr>\n\
         <tr><th>Pagados a tiempo</th><td>{}{}</td></tr>\n</table>\n",
        p.declared,
        p.accepted,
        p.rejected,
        p.pending,
        p.on_time,
        p.on_time_ratio.map_or_else(String::new, |r| format!(" ({:.0}%)", r * 100.0)),
    );

    let i = &cert.incidents;
    let _ = write!(
        html,
        "<h2>Incidencias</h2>\n<table>\n\
         <tr><th>Reportadas</th><td>{}</td></tr>\n\
         <tr><th>Pendientes</th><td>{}</td></tr>\n\
         <tr><th>En proceso</th><td>{}</td></tr>\n\
         <tr><th>Resueltas</th><td>{}</td></tr>\n</table>\n",
        i.total, i.pending, i.in_progress, i.resolved,
    );

    let _ = writeln!(
        html,
        "<h2>Historial de arriendos</h2>\n<p>{} contratos, {} activos, {} finalizados.</p>",
        cert.contracts.total, cert.contracts.active, cert.contracts.finalized
    );
    if !cert.contracts.entries.is_empty() {
        html.push_str("<table>\n<tr><th>Propiedad</th><th>Arrendador</th><th>Desde</th><th>Hasta</th><th>Arriendo</th><th>Estado</th></tr>\n");
        for c in &cert.contracts.entries {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&c.property_name),
                escape_html(&c.landlord_name),
                c.start_date.format("%d-%m-%Y"),
                c.end_date.format("%d-%m-%Y"),
                c.rent,
                c.status,
            );
        }
        html.push_str("</table>\n");
    }
    html.push_str(
        "<p class=\"muted\">Documento generado automáticamente a partir de los registros del sistema.</p>\n\
         <p class=\"no-print\"><button onclick=\"window.print()\">Imprimir</button></p>\n</body>\n</html>\n",
    );
    html
}
