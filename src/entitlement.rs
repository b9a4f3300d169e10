/// Answers whether the user may open premium content.
///
/// Purchases and restores belong to the store vendor; this crate only reads
/// the resulting flag.
pub trait EntitlementProvider: Send + Sync {
    fn is_entitled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEntitlement(pub bool);

impl EntitlementProvider for StaticEntitlement {
    fn is_entitled(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_flag_is_reported() {
        let providers: Vec<Box<dyn EntitlementProvider>> =
            vec![Box::new(StaticEntitlement(true)), Box::new(StaticEntitlement::default())];
        let answers: Vec<bool> = providers.iter().map(|p| p.is_entitled()).collect();
        assert_eq!(answers, vec![true, false]);
    }
}
