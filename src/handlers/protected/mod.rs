pub mod auth;
pub mod chat;
pub mod deliveries;
pub mod integrations;
pub mod invoices;
pub mod leads;
pub mod payroll;
pub mod products;

/// Clamp client-supplied paging to configured bounds.
pub(crate) fn page_limits(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let cfg = crate::config::config();
    let limit = limit
        .unwrap_or(cfg.api.default_page_size)
        .clamp(1, cfg.api.max_page_size);
    (limit, offset.unwrap_or(0).max(0))
}

#[cfg(test)]
mod tests {
    use super::page_limits;

    #[test]
    fn clamps_paging_to_bounds() {
        let max = crate::config::config().api.max_page_size;
        let default = crate::config::config().api.default_page_size;

        assert_eq!(page_limits(None, None), (default, 0));
        assert_eq!(page_limits(Some(0), Some(-5)), (1, 0));
        assert_eq!(page_limits(Some(max + 1000), Some(10)), (max, 10));
    }
}
