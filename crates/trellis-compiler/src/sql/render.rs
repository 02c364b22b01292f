//! Statement generation: schema-table trees into SQL text plus the
//! structured row layout.

use tracing::debug;
use trellis_core::{
    ColumnType, CompilerConfig, Dialect, ElementKind, ID_COLUMN, Predicate, TextMatch, Value,
    fk_column,
};
use trellis_plan::{
    AliasMap, ColumnFilter, Join, ScratchTable, SelectColumn, SortKey, SortOrder, SqlPlan,
    SqlStatement, StatementGroup, StatementTable,
};

use super::SqlError;
use super::resolve::{SchemaTableTree, TableNode};

pub(crate) fn render(
    dialect: &dyn Dialect,
    config: &CompilerConfig,
    trees: &[SchemaTableTree],
) -> Result<SqlPlan, SqlError> {
    let mut chains: Vec<Vec<&TableNode>> = Vec::new();
    for tree in trees {
        'path: for path in tree.leaf_paths() {
            let nodes: Vec<&TableNode> = path.iter().map(|&i| tree.node(i)).collect();
            for node in &nodes {
                if !label_filters_admit(node) {
                    continue 'path;
                }
            }
            chains.push(nodes);
        }
    }

    let max_joins = config
        .max_joins_per_statement
        .unwrap_or_else(|| dialect.max_joins_per_select());

    let mut partitioned = Vec::new();
    let mut total = 0;
    for chain in &chains {
        let parts = partition(dialect, chain.len(), max_joins)?;
        total += parts.len();
        partitioned.push(parts);
    }

    let single = total == 1;
    let mut scratch_seq = 1;
    let mut groups = Vec::new();
    let mut residual_limit: Option<u64> = None;

    for (chain, parts) in chains.iter().zip(partitioned) {
        let limit = chain.last().and_then(|n| n.limit);
        if !single {
            if let Some(n) = limit {
                residual_limit = Some(residual_limit.map_or(n, |existing| existing.min(n)));
            }
        }
        let last_part = parts.len() - 1;
        let mut partitions = Vec::new();
        for (pi, range) in parts.into_iter().enumerate() {
            let slice = &chain[range];
            partitions.push(render_statement(
                dialect,
                config,
                slice,
                pi > 0,
                pi == last_part && single,
                &mut scratch_seq,
            ));
        }
        groups.push(StatementGroup { partitions });
    }

    debug!(statements = total, "generated sql plan");
    Ok(SqlPlan {
        groups,
        residual_limit,
        is_for_multiple_queries: total > 1,
        may_query_during_build: false,
    })
}

fn label_filters_admit(node: &TableNode) -> bool {
    let label = Value::Str(node.table.label().to_string());
    node.label_filters.iter().all(|c| c.predicate.test(&label))
}

/// Chunk a chain at the join ceiling. Partitions share their boundary
/// node: each partition after the first re-selects the previous leaf's
/// identity column so the emitter can merge rows by element id.
fn partition(
    dialect: &dyn Dialect,
    len: usize,
    max_joins: usize,
) -> Result<Vec<std::ops::RangeInclusive<usize>>, SqlError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let joins = len - 1;
    if joins <= max_joins {
        return Ok(vec![0..=len - 1]);
    }
    if max_joins == 0 {
        return Err(SqlError::DialectRejection {
            dialect: dialect.name().to_string(),
            reason: format!("plan requires {joins} joins but the dialect allows none"),
        });
    }
    let mut parts = Vec::new();
    let mut start = 0;
    while start < len - 1 {
        let end = (start + max_joins).min(len - 1);
        parts.push(start..=end);
        start = end;
    }
    Ok(parts)
}

fn table_alias(i: usize) -> String {
    format!("t{i}")
}

fn render_statement(
    dialect: &dyn Dialect,
    config: &CompilerConfig,
    nodes: &[&TableNode],
    skip_first: bool,
    limit_in_sql: bool,
    scratch_seq: &mut usize,
) -> SqlStatement {
    let max_ident = dialect.max_identifier_length();
    let last = nodes.len() - 1;

    let mut aliases = AliasMap::new();
    let mut select = Vec::new();
    let mut select_sql: Vec<String> = Vec::new();
    let mut root_id_select = 0;
    let mut leaf_id_select = 0;

    for (i, node) in nodes.iter().enumerate() {
        let qualifier = dialect.quote(&table_alias(i));
        let columns: Vec<&str> = if skip_first && i == 0 {
            vec![ID_COLUMN]
        } else {
            node.columns.iter().map(String::as_str).collect()
        };
        for column in columns {
            let alias = aliases.alias(i, column, max_ident);
            if column == ID_COLUMN {
                if i == 0 {
                    root_id_select = select.len();
                }
                if i == last {
                    leaf_id_select = select.len();
                }
            }
            select_sql.push(format!(
                "{qualifier}.{} AS {}",
                dialect.quote(column),
                dialect.quote(&alias),
            ));
            select.push(SelectColumn {
                alias,
                table: i,
                column: column.to_string(),
            });
        }
    }

    let mut from_sql = format!(
        "{} AS {}",
        nodes[0].table.quoted(dialect),
        dialect.quote(&table_alias(0)),
    );
    let mut where_sql: Vec<String> = Vec::new();
    let mut order_sql: Vec<String> = Vec::new();
    let mut order_by = Vec::new();
    let mut scratch = Vec::new();
    let mut tables = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        let join = (i > 0).then(|| join_for(node, nodes[i - 1], i - 1));
        if let Some(join) = &join {
            from_sql.push_str(&format!(
                " INNER JOIN {} AS {} ON {}.{} = {}.{}",
                node.table.quoted(dialect),
                dialect.quote(&table_alias(i)),
                dialect.quote(&table_alias(join.parent)),
                dialect.quote(&join.parent_column),
                dialect.quote(&table_alias(i)),
                dialect.quote(&join.column),
            ));
        }

        let boundary = skip_first && i == 0;
        let mut filters = Vec::new();
        if !boundary {
            for filter in &node.filters {
                let mut filter = filter.clone();
                if needs_scratch(config, &filter.predicate) {
                    let name = dialect.scratch_table_name(*scratch_seq);
                    *scratch_seq += 1;
                    scratch.push(make_scratch(&name, &filter.predicate));
                    filter.scratch = Some(name);
                }
                where_sql.push(render_filter(dialect, &table_alias(i), &filter));
                filters.push(filter);
            }
            for (column, order) in &node.order_by {
                order_sql.push(format!(
                    "{}.{} {}",
                    dialect.quote(&table_alias(i)),
                    dialect.quote(column),
                    match order {
                        SortOrder::Asc => "ASC",
                        SortOrder::Desc => "DESC",
                    },
                ));
                order_by.push(SortKey {
                    table: i,
                    column: column.clone(),
                    order: *order,
                });
            }
        }

        tables.push(StatementTable {
            table: node.table.clone(),
            kind: node.kind,
            label: node.table.label().to_string(),
            join,
            filters,
            emits: node.emits && !boundary,
            step_labels: node.step_labels.clone(),
            depth: node.depth,
            projection: node.projection.clone(),
        });
    }

    let mut sql = format!("SELECT {} FROM {}", select_sql.join(", "), from_sql);
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql.join(" AND "));
    }
    if !order_sql.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_sql.join(", "));
    }
    let mut limit = None;
    if limit_in_sql {
        if let Some(n) = nodes[last].limit {
            sql.push_str(&dialect.limit_clause(n));
            limit = Some(n);
        }
    }
    if dialect.needs_semicolon() {
        sql.push(';');
    }

    SqlStatement {
        sql,
        tables,
        select,
        aliases,
        order_by,
        limit,
        scratch,
        root_id_select,
        leaf_id_select,
        skip_first_table: skip_first,
    }
}

/// Join condition for a node against its predecessor in the chain.
///
/// Vertex-to-edge joins go through the edge's foreign key on the side the
/// parent vertex occupies; edge-to-vertex joins go through the foreign key
/// naming the child vertex's endpoint side.
fn join_for(node: &TableNode, parent: &TableNode, parent_idx: usize) -> Join {
    match node.kind {
        ElementKind::Edge => {
            let direction = node.direction.expect("edge node carries its entry side");
            Join {
                parent: parent_idx,
                parent_column: ID_COLUMN.to_string(),
                column: fk_column(&node.table.schema, parent.table.label(), direction),
            }
        }
        ElementKind::Vertex => {
            let endpoint = node.endpoint.expect("vertex node carries its endpoint side");
            Join {
                parent: parent_idx,
                parent_column: fk_column(&parent.table.schema, node.table.label(), endpoint),
                column: ID_COLUMN.to_string(),
            }
        }
    }
}

fn needs_scratch(config: &CompilerConfig, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Within(values) | Predicate::Without(values) => {
            values.len() >= config.temp_table_threshold
        }
        _ => false,
    }
}

fn make_scratch(name: &str, predicate: &Predicate) -> ScratchTable {
    let values = match predicate {
        Predicate::Within(values) | Predicate::Without(values) => values.clone(),
        _ => Vec::new(),
    };
    let column_type = values
        .first()
        .map(Value::column_type)
        .unwrap_or(ColumnType::Text);
    ScratchTable {
        name: name.to_string(),
        column: "val".to_string(),
        column_type,
        values,
    }
}

fn render_filter(dialect: &dyn Dialect, table_alias: &str, filter: &ColumnFilter) -> String {
    let column = format!(
        "{}.{}",
        dialect.quote(table_alias),
        dialect.quote(&filter.column),
    );
    render_predicate(dialect, &column, &filter.predicate, filter.scratch.as_deref())
}

/// The fixed predicate-to-SQL mapping: comparisons to their operator,
/// ranges to `AND`, exteriors to `OR`, membership to `IN`/`NOT IN` (or a
/// scratch-table subselect), text to the dialect's pattern operator.
fn render_predicate(
    dialect: &dyn Dialect,
    column: &str,
    predicate: &Predicate,
    scratch: Option<&str>,
) -> String {
    match predicate {
        Predicate::Compare(op, value) => {
            format!("{column} {} {}", op.sql_operator(), literal(value))
        }
        Predicate::And(a, b) => format!(
            "({} AND {})",
            render_predicate(dialect, column, a, None),
            render_predicate(dialect, column, b, None),
        ),
        Predicate::Or(a, b) => format!(
            "({} OR {})",
            render_predicate(dialect, column, a, None),
            render_predicate(dialect, column, b, None),
        ),
        Predicate::Within(values) => match scratch {
            Some(name) => format!(
                "{column} IN (SELECT {} FROM {})",
                dialect.quote("val"),
                dialect.quote(name),
            ),
            None if values.is_empty() => "1 = 0".to_string(),
            None => format!("{column} IN ({})", literals(values)),
        },
        Predicate::Without(values) => match scratch {
            Some(name) => format!(
                "{column} NOT IN (SELECT {} FROM {})",
                dialect.quote("val"),
                dialect.quote(name),
            ),
            None if values.is_empty() => "1 = 1".to_string(),
            None => format!("{column} NOT IN ({})", literals(values)),
        },
        Predicate::Text(op, needle) => render_text(dialect, column, *op, needle),
    }
}

fn render_text(dialect: &dyn Dialect, column: &str, op: TextMatch, needle: &str) -> String {
    let escaped = escape_like(needle);
    let pattern = match op {
        TextMatch::Contains | TextMatch::NotContains | TextMatch::ContainsCi
        | TextMatch::NotContainsCi => format!("%{escaped}%"),
        TextMatch::StartsWith | TextMatch::NotStartsWith => format!("{escaped}%"),
        TextMatch::EndsWith | TextMatch::NotEndsWith => format!("%{escaped}"),
    };
    let negation = if op.is_negated() { "NOT " } else { "" };
    let operator = dialect.regex_operator();
    if op.is_case_insensitive() {
        if dialect.supports_ilike() {
            format!("{column} {negation}I{operator} {}", string_literal(&pattern))
        } else {
            format!(
                "lower({column}) {negation}{operator} {}",
                string_literal(&pattern.to_lowercase()),
            )
        }
    } else {
        format!("{column} {negation}{operator} {}", string_literal(&pattern))
    }
}

/// Escape pattern metacharacters so the needle matches literally.
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => string_literal(s),
    }
}

fn literals(values: &[Value]) -> String {
    values
        .iter()
        .map(literal)
        .collect::<Vec<_>>()
        .join(", ")
}
