use chrono::{SubsecRound, Utc};

use super::{ClientContext, ClientError};
use crate::correlation::{CorrelationId, HEADER};
use crate::timing::{elapsed_micros, local_timestamp, ClientTimingLine, Severity};

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub id: CorrelationId,
    pub status: u16,
    pub elapsed_us: u64,
}

/// One timed round trip.
///
/// The clock starts right before the request is sent and stops as soon as
/// the response head arrives, before the body is read. The timing line is
/// printed first, then (optionally) the body. A non-2xx status is printed
/// like any other response and then reported as [`ClientError::Status`].
pub async fn run_unit(ctx: &ClientContext) -> Result<UnitReport, ClientError> {
    let id = CorrelationId::generate();
    let request = ctx
        .http
        .get(&ctx.url)
        .header(HEADER, id.as_str())
        .build()
        .map_err(ClientError::Build)?;

    // ── Timed section ───────────────────────────────────────────
    // Timestamps are cut to the printed precision so the elapsed value is
    // exactly their difference.
    let started_at = Utc::now().trunc_subsecs(6);
    let response = ctx
        .http
        .execute(request)
        .await
        .map_err(ClientError::Transport)?;
    let finished_at = Utc::now().trunc_subsecs(6);
    // ────────────────────────────────────────────────────────────
    let elapsed_us = elapsed_micros(started_at, finished_at);

    let line = ClientTimingLine {
        uuid: id.to_string(),
        severity: Severity::Warning,
        start_request: local_timestamp(started_at, ctx.time_zone),
        get_response: local_timestamp(finished_at, ctx.time_zone),
        client_elapsed: elapsed_us,
    };
    ctx.out.write_line(&line.render());

    let status = response.status();
    if ctx.print_body {
        let body = response.text().await.map_err(ClientError::Body)?;
        ctx.out.write_line(&body);
    }

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
        });
    }

    Ok(UnitReport {
        id,
        status: status.as_u16(),
        elapsed_us,
    })
}
