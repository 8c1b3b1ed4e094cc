//! Statement pipeline.
//!
//! ```text
//! Statement -> extract -> cache lookup -> parse -> validate -> transform -> compile -> cache store
//!                               \ hit ------------------------------------------------/
//!                                                                            -> bind arguments
//! ```
//!
//! Every stage before binding is a pure function of the statement text (or
//! tree) and its configuration, so its output is cached. Binding runs for
//! every call, against the cached plan's input shape, so a hit still rejects
//! a wrong argument list.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::ast;
use crate::cache::{CacheService, CachedAst, CachedPlan, KeyMaterial};
use crate::config::StatementConfig;
use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::params::{InputShape, ParameterStyle, Parameters};
use crate::parser::{self, Comment};
use crate::statement::{LoadedQuery, Statement, StatementSource};
use crate::transformer::{self, LiteralParameterizer, Transformer};
use crate::transpiler;
use crate::validator::{ValidationContext, ValidationFinding, Validator, ValidatorSet};

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStatement {
    pub sql: String,
    /// A list or a name-keyed map, depending on [`style`](Self::style).
    pub parameters: Parameters,
    /// Advisory findings. Blocking findings fail the run instead.
    pub findings: Vec<ValidationFinding>,
    pub dialect: Dialect,
    pub style: ParameterStyle,
}

/// Compiles statements against a shared [`CacheService`].
pub struct Pipeline {
    cache: Arc<CacheService>,
    validators: ValidatorSet,
    transformers: Vec<Arc<dyn Transformer>>,
    parses: AtomicUsize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Arc::new(CacheService::default()))
    }
}

impl Pipeline {
    /// Pipeline with the built-in validators and no custom transformers.
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self {
            cache,
            validators: ValidatorSet::new(),
            transformers: Vec::new(),
            parses: AtomicUsize::new(0),
        }
    }

    /// Append a custom transformer. Custom transformers run in registration
    /// order, before literal parameterization.
    pub fn with_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Arc::new(transformer));
        self
    }

    /// Append a custom validator.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.register(Box::new(validator));
        self
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// How many times this pipeline has invoked the parser.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    /// Run the pipeline for one statement and bind its arguments.
    pub fn compile(&self, statement: &Statement) -> KilnResult<CompiledStatement> {
        let config = statement.config();
        let cached = match statement.source() {
            StatementSource::Sql(sql) => self.sql_plan(sql, statement.dialect(), config)?,
            StatementSource::Ast(tree) => self.builder_plan(tree, config)?,
            StatementSource::File(query) => self.file_plan(query, statement.dialect(), config)?,
        };
        let parameters = cached.plan.bind(statement.params())?;
        tracing::debug!(
            dialect = %cached.plan.dialect,
            style = %cached.plan.style,
            params = parameters.len(),
            findings = cached.findings.len(),
            "statement ready"
        );
        Ok(CompiledStatement {
            sql: cached.plan.sql.clone(),
            parameters,
            findings: cached.findings.clone(),
            dialect: cached.plan.dialect,
            style: cached.plan.style,
        })
    }

    /// Key fields shared by every tier: everything besides the source that
    /// changes what the pipeline produces.
    fn key(&self, tier: &str, source_dialect: Dialect, config: &StatementConfig) -> KeyMaterial {
        let styles = config
            .supported_styles_for(source_dialect)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        KeyMaterial::new(tier)
            .field("source_dialect", source_dialect)
            .field("parsing", config.enable_parsing)
            .field("validation", config.enable_validation)
            .field("transformations", config.enable_transformations)
            .field("literals", config.literal_parameterization)
            .field("validators", format!("{:?}", config.validators))
            .field("validator_set", self.validators.fingerprint())
            .field("styles", styles)
            .field(
                "declared_style",
                config.parameter_style.map_or_else(|| "-".to_string(), |s| s.to_string()),
            )
            .field("transformers", transformer::chain_fingerprint(&self.transformers))
    }

    fn with_target(material: KeyMaterial, config: &StatementConfig) -> KeyMaterial {
        material
            .field("dialect", config.dialect)
            .field("target", config.target_style())
    }

    fn sql_plan(&self, sql: &str, source_dialect: Dialect, config: &StatementConfig) -> KilnResult<Arc<CachedPlan>> {
        if !config.enable_caching {
            return self.plan_from_text(sql, source_dialect, config).map(Arc::new);
        }
        let material = Self::with_target(self.key("sql", source_dialect, config), config).field("sql", sql);
        self.cache
            .sql()
            .get_or_compute(&material, || self.plan_from_text(sql, source_dialect, config))
    }

    fn file_plan(
        &self,
        query: &LoadedQuery,
        source_dialect: Dialect,
        config: &StatementConfig,
    ) -> KilnResult<Arc<CachedPlan>> {
        if !config.enable_caching {
            return self.plan_from_text(&query.sql, source_dialect, config).map(Arc::new);
        }
        let material = Self::with_target(self.key("file", source_dialect, config), config)
            .field("name", &query.name)
            .field("checksum", &query.checksum);
        self.cache.file_plan(&query.name, &query.checksum, &material, || {
            self.plan_from_text(&query.sql, source_dialect, config)
        })
    }

    fn builder_plan(&self, tree: &ast::Statement, config: &StatementConfig) -> KilnResult<Arc<CachedPlan>> {
        if !config.enable_caching {
            return self.plan_from_tree(tree, config).map(Arc::new);
        }
        let serialized = serde_json::to_string(tree)
            .map_err(|e| KilnError::compilation(format!("cannot fingerprint statement tree: {}", e)))?;
        let material = Self::with_target(self.key("builder", config.dialect, config), config).field("tree", serialized);
        self.cache
            .builder()
            .get_or_compute(&material, || self.plan_from_tree(tree, config))
    }

    /// Extract, then either rewrite placeholders in place (parsing disabled)
    /// or go through the tree and compile it.
    fn plan_from_text(&self, sql: &str, source_dialect: Dialect, config: &StatementConfig) -> KilnResult<CachedPlan> {
        let descriptors = config.extractor(source_dialect).extract(sql);
        tracing::trace!(count = descriptors.len(), "extracted parameters");
        let shape = InputShape::from_declared(&descriptors, config.parameter_style)?;

        if !config.enable_parsing {
            let plan = transpiler::rewrite_placeholders(sql, &descriptors, config.dialect, config.target_style())?;
            return Ok(CachedPlan {
                plan,
                findings: Vec::new(),
            });
        }

        let analyze = || -> KilnResult<CachedAst> {
            self.parses.fetch_add(1, Ordering::Relaxed);
            let parsed = parser::parse(sql, source_dialect, &descriptors)?;
            let (statement, findings) = self.analyze(parsed.statement, &parsed.comments, source_dialect, config)?;
            Ok(CachedAst {
                statement,
                findings,
                shape: shape.clone(),
            })
        };
        let tree = if config.enable_caching {
            let material = self.key("ast", source_dialect, config).field("sql", sql);
            self.cache.ast().get_or_compute(&material, analyze)?
        } else {
            Arc::new(analyze()?)
        };

        let mut plan = transpiler::compile(&tree.statement, config.dialect, config.target_style())?;
        plan.shape = tree.shape.clone();
        Ok(CachedPlan {
            plan,
            findings: tree.findings.clone(),
        })
    }

    fn plan_from_tree(&self, tree: &ast::Statement, config: &StatementConfig) -> KilnResult<CachedPlan> {
        let (statement, findings) = self.analyze(tree.clone(), &[], config.dialect, config)?;
        let plan = transpiler::compile(&statement, config.dialect, config.target_style())?;
        Ok(CachedPlan { plan, findings })
    }

    /// Validate, then transform. Fails with every blocking finding.
    fn analyze(
        &self,
        statement: ast::Statement,
        comments: &[Comment],
        dialect: Dialect,
        config: &StatementConfig,
    ) -> KilnResult<(ast::Statement, Vec<ValidationFinding>)> {
        let findings = if config.enable_validation {
            let ctx = ValidationContext {
                statement: &statement,
                comments,
                dialect,
            };
            self.validators.run(&ctx, &config.validators).into_result()?
        } else {
            Vec::new()
        };

        if !config.enable_transformations {
            return Ok((statement, findings));
        }
        let statement = transformer::apply(&self.transformers, statement);
        let statement = if config.literal_parameterization {
            LiteralParameterizer::new().transform(statement)
        } else {
            statement
        };
        Ok((statement, findings))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::params::{Params, Value};
    use crate::validator::{FindingKind, ValidatorMode};

    fn config(dialect: Dialect) -> Arc<StatementConfig> {
        Arc::new(StatementConfig::for_dialect(dialect))
    }

    #[test]
    fn test_qmark_to_numeric() {
        let pipeline = Pipeline::default();
        let stmt = Statement::sql("SELECT id FROM t WHERE x = ? LIMIT 1", config(Dialect::Postgres))
            .bind(Params::positional([5]));
        let out = pipeline.compile(&stmt).unwrap();
        assert_eq!(out.sql, "SELECT id FROM t WHERE x = $1 LIMIT 1");
        assert_eq!(out.parameters, Parameters::Positional(vec![Value::Int(5)]));
        assert_eq!(out.style, ParameterStyle::Numeric);
    }

    #[test]
    fn test_ast_tier_shared_across_targets() {
        let pipeline = Pipeline::default();
        let sql = "SELECT id FROM t WHERE x = :x LIMIT 1";
        let numeric = StatementConfig::builder()
            .dialect(Dialect::Postgres)
            .build()
            .unwrap();
        let named = StatementConfig::builder()
            .dialect(Dialect::Postgres)
            .target_style(ParameterStyle::NamedColon)
            .build()
            .unwrap();

        let params = Params::named([("x", 1)]);
        let a = pipeline.compile(&Statement::sql(sql, numeric).bind(params.clone())).unwrap();
        let b = pipeline.compile(&Statement::sql(sql, named).bind(params)).unwrap();
        assert_eq!(a.sql, "SELECT id FROM t WHERE x = $1 LIMIT 1");
        assert_eq!(b.sql, sql);
        assert_eq!(pipeline.parse_count(), 1);
        assert_eq!(pipeline.cache().stats().ast.hits, 1);
    }

    #[test]
    fn test_text_only_rewrites_without_parsing() {
        let pipeline = Pipeline::default();
        let config = StatementConfig::builder()
            .dialect(Dialect::Postgres)
            .text_only()
            .build()
            .unwrap();
        let stmt = Statement::sql("SELEKT * FROM t WHERE a = ? AND b = ?", config).bind(Params::positional([1, 2]));
        let out = pipeline.compile(&stmt).unwrap();
        assert_eq!(out.sql, "SELEKT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(pipeline.parse_count(), 0);
    }

    #[test]
    fn test_builder_tree() {
        use crate::ast::builders::{col, eq, int, named, select};

        let pipeline = Pipeline::default();
        let tree = select(&["id"], "users")
            .filter(eq(col("email"), named("email")))
            .limit(int(1))
            .into_statement();
        let stmt = Statement::ast(tree, config(Dialect::MySQL)).bind(Params::named([("email", "a@b.c")]));
        let out = pipeline.compile(&stmt).unwrap();
        assert_eq!(out.sql, "SELECT id FROM users WHERE email = ? LIMIT 1");
        assert_eq!(out.parameters, Parameters::Positional(vec![Value::from("a@b.c")]));

        pipeline.compile(&stmt).unwrap();
        assert_eq!(pipeline.cache().stats().builder.hits, 1);
        assert_eq!(pipeline.parse_count(), 0);
    }

    #[test]
    fn test_validation_mode_is_part_of_the_key() {
        let pipeline = Pipeline::default();
        let sql = "DELETE FROM t";
        let block = config(Dialect::Postgres);
        let warn = Arc::new(
            StatementConfig::builder()
                .validator(FindingKind::DmlSafety, ValidatorMode::Warn)
                .build()
                .unwrap(),
        );

        assert!(matches!(
            pipeline.compile(&Statement::sql(sql, block)),
            Err(KilnError::Validation { .. })
        ));
        let out = pipeline.compile(&Statement::sql(sql, warn)).unwrap();
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].code, "missing_where");
    }

    #[test]
    fn test_caching_disabled_parses_every_time() {
        let pipeline = Pipeline::default();
        let config = Arc::new(StatementConfig::builder().caching(false).build().unwrap());
        for _ in 0..3 {
            pipeline
                .compile(&Statement::sql("SELECT 1 LIMIT 1", Arc::clone(&config)))
                .unwrap();
        }
        assert_eq!(pipeline.parse_count(), 3);
        assert_eq!(pipeline.cache().stats().total().entries, 0);
    }
}
