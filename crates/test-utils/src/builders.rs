use runledger::units::UnitDefinition;

/// Builder for `UnitDefinition`.
pub struct UnitBuilder {
    def: UnitDefinition,
}

impl UnitBuilder {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            def: UnitDefinition::new(name, source),
        }
    }

    pub fn runtime(mut self, runtime: &str) -> Self {
        self.def.runtime = runtime.to_string();
        self
    }

    pub fn cron(mut self, expr: &str) -> Self {
        self.def.cron = Some(expr.to_string());
        self
    }

    pub fn build(self) -> UnitDefinition {
        self.def
    }
}
