//! SQL statements against the agent registry schema
//!
//! JSON columns are cast to text so they decode as `String` regardless of
//! whether the column is declared `JSON` or `TEXT`.

/// Instruction text mapped to the agent for a service
///
/// Binds: snake-case agent name, title-case agent name, service name.
pub const GET_AGENT_INSTRUCTION: &str = r#"
    SELECT ai.instruction_content
    FROM service_agent_mappings sam
    JOIN services s ON sam.service_id = s.service_id
    JOIN agents a ON sam.agent_id = a.agent_id
    LEFT JOIN agent_instructions ai ON sam.agent_instruction_id = ai.instruction_id
    WHERE a.name IN (?, ?)
      AND s.name = ?
      AND sam.is_active = 1
"#;

/// Agent card record
///
/// Binds: snake-case agent name, title-case agent name.
pub const GET_AGENT_RECORD: &str = r#"
    SELECT
        agent_id,
        name,
        description,
        CAST(capabilities AS CHAR) AS capabilities,
        CAST(skills AS CHAR) AS skills,
        CAST(default_input_modes AS CHAR) AS default_input_modes,
        CAST(default_output_modes AS CHAR) AS default_output_modes
    FROM agents
    WHERE name IN (?, ?)
    LIMIT 1
"#;

/// Non-orchestrator agents active in a service, for peer discovery
///
/// Binds: service id.
pub const GET_AGENT_URLS: &str = r#"
    SELECT DISTINCT a.base_url, a.agent_id
    FROM service_agent_mappings sam
    INNER JOIN agents a ON sam.agent_id = a.agent_id
    WHERE sam.service_id = ? AND sam.is_active = 1 AND a.is_orchestrator = 0
    ORDER BY a.agent_id ASC
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_placeholder_counts_match_binds() {
        assert_eq!(placeholders(GET_AGENT_INSTRUCTION), 3);
        assert_eq!(placeholders(GET_AGENT_RECORD), 2);
        assert_eq!(placeholders(GET_AGENT_URLS), 1);
    }
}
