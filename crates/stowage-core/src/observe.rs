//! Optional metrics instrumentation for stowage.
//!
//! When the `observe` feature is enabled, store operations emit counters and
//! histograms via the [`metrics`] crate. A downstream application must install
//! a metrics recorder (e.g. `metrics-exporter-prometheus`) to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a single store operation (counter + latency histogram).
///
/// - `stowage.operations_total` – counter with `backend`, `op` and `outcome` labels
/// - `stowage.operation_duration_seconds` – histogram with `backend` and `op` labels
#[inline]
pub fn record_operation(
    backend: &'static str,
    op: &'static str,
    duration: std::time::Duration,
    success: bool,
) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!(
            "stowage.operations_total",
            "backend" => backend,
            "op" => op,
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "stowage.operation_duration_seconds",
            "backend" => backend,
            "op" => op
        )
        .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (backend, op, duration, success);
    }
}

/// Record the size of a bulk insert.
///
/// - `stowage.bulk_update.items_total` – counter with `backend` label
#[inline]
pub fn record_bulk_update(backend: &'static str, items: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("stowage.bulk_update.items_total", "backend" => backend)
            .increment(items as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (backend, items);
    }
}

/// Record a lazy handle (re)open.
///
/// - `stowage.handle_opens_total` – counter with `backend` label
#[inline]
pub fn record_handle_open(backend: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("stowage.handle_opens_total", "backend" => backend).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = backend;
    }
}

/// Time `f` and record it as `op` on `backend`.
#[inline]
pub fn timed<T, E>(
    backend: &'static str,
    op: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let start = std::time::Instant::now();
    let result = f();
    record_operation(backend, op, start.elapsed(), result.is_ok());
    result
}
