use super::{ObjectId, SnmpHandle, SnmpType, VarBind};
use crate::collector::types::Mode;
use crate::error::{Error, Result};

/// Обходит поддерево `anchor` в заданном режиме.
///
/// - `single`: ровно один GET, без цикла;
/// - `walk`: GET-NEXT, пока ответ лежит под `anchor` и OID растет;
/// - `table`: как `walk`, но только прямые потомки `anchor`.
///
/// Результат, на котором обход остановился, в выдачу не попадает.
/// Любая ошибка транспорта или агента прерывает обход целиком; повторы
/// задаются настройками транспорта, а не здесь.
pub async fn traverse(
    handle: &mut dyn SnmpHandle,
    anchor: &ObjectId,
    mode: Mode,
) -> Result<Vec<VarBind>> {
    let wrap = |e: Error| Error::Traversal {
        oid: anchor.to_string(),
        mode,
        source: Box::new(e),
    };

    if mode == Mode::Single {
        let varbind = handle.get(anchor).await.map_err(wrap)?;
        return Ok(vec![varbind]);
    }

    let mut results = Vec::new();
    let mut previous = anchor.clone();

    loop {
        let varbind = handle.get_next(&previous).await.map_err(wrap)?;
        if !continues_walk(anchor, &previous, &varbind, mode) {
            break;
        }
        previous = varbind.oid.clone();
        results.push(varbind);
    }

    tracing::trace!(oid = %anchor, %mode, count = results.len(), "обход завершен");
    Ok(results)
}

fn continues_walk(anchor: &ObjectId, previous: &ObjectId, varbind: &VarBind, mode: Mode) -> bool {
    if varbind.value.kind == SnmpType::EndOfMibView {
        return false;
    }
    // вышли из поддерева (в том числе OID короче якоря)
    if !varbind.oid.starts_with(anchor) {
        return false;
    }
    // агент не продвигается
    if varbind.oid <= *previous {
        return false;
    }
    if mode == Mode::Table && varbind.oid.len() != anchor.len() + 1 {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::memory::{MemoryAgent, MemoryHandle, MemoryTransport};
    use crate::snmp::parse_oid;

    const ADDRESS: &str = "10.0.0.1:161";

    fn handle(agent: MemoryAgent) -> MemoryHandle {
        MemoryTransport::new()
            .with_agent(ADDRESS, agent)
            .handle(ADDRESS)
            .unwrap()
    }

    fn sys_or_table() -> MemoryAgent {
        MemoryAgent::new()
            .with("1.3.6.1.2.1.1.9.1.2.1", SnmpType::ObjectIdentifier, "1.3.6.1.6.3.1")
            .with("1.3.6.1.2.1.1.9.1.3.1", SnmpType::OctetString, "SNMPv2 MIB")
            .with("1.3.6.1.2.1.1.9.1.3.2", SnmpType::OctetString, "TCP MIB")
            .with("1.3.6.1.2.1.1.9.1.3.3", SnmpType::OctetString, "IP MIB")
            .with("1.3.6.1.2.1.1.9.1.3.3.1", SnmpType::OctetString, "nested")
            .with("1.3.6.1.2.1.1.9.1.4.1", SnmpType::TimeTicks, "5")
    }

    fn oids(results: &[VarBind]) -> Vec<String> {
        results.iter().map(|vb| vb.oid.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_issues_one_request() {
        let transport = MemoryTransport::new().with_agent(ADDRESS, sys_or_table());
        let mut handle = transport.handle(ADDRESS).unwrap();
        let anchor = parse_oid(".1.3.6.1.2.1.1.9.1.3.2").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Single).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value.text, "TCP MIB");
        assert_eq!(transport.agent(ADDRESS).unwrap().requests(), 1);
    }

    #[tokio::test]
    async fn test_table_returns_direct_children_only() {
        let mut handle = handle(sys_or_table());
        let anchor = parse_oid(".1.3.6.1.2.1.1.9.1.3").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Table).await.unwrap();

        assert_eq!(
            oids(&results),
            vec![
                "1.3.6.1.2.1.1.9.1.3.1",
                "1.3.6.1.2.1.1.9.1.3.2",
                "1.3.6.1.2.1.1.9.1.3.3",
            ]
        );
        assert!(results.iter().all(|vb| vb.oid.len() == anchor.len() + 1));
    }

    #[tokio::test]
    async fn test_walk_includes_deeper_branches() {
        let mut handle = handle(sys_or_table());
        let anchor = parse_oid("1.3.6.1.2.1.1.9.1.3").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Walk).await.unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[3].oid.to_string(), "1.3.6.1.2.1.1.9.1.3.3.1");
        assert!(results.iter().all(|vb| vb.oid.starts_with(&anchor)));
        assert!(results.windows(2).all(|w| w[0].oid < w[1].oid));
    }

    #[tokio::test]
    async fn test_walk_stops_on_repeated_oid() {
        let agent = sys_or_table().with_next_override(
            "1.3.6.1.2.1.1.9.1.3.2",
            "1.3.6.1.2.1.1.9.1.3.2",
            SnmpType::OctetString,
            "TCP MIB",
        );
        let mut handle = handle(agent);
        let anchor = parse_oid("1.3.6.1.2.1.1.9.1.3").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Walk).await.unwrap();

        assert_eq!(
            oids(&results),
            vec!["1.3.6.1.2.1.1.9.1.3.1", "1.3.6.1.2.1.1.9.1.3.2"]
        );
    }

    #[tokio::test]
    async fn test_walk_stops_when_oid_goes_backwards() {
        let agent = sys_or_table().with_next_override(
            "1.3.6.1.2.1.1.9.1.3.2",
            "1.3.6.1.2.1.1.9.1.3.1",
            SnmpType::OctetString,
            "SNMPv2 MIB",
        );
        let mut handle = handle(agent);
        let anchor = parse_oid("1.3.6.1.2.1.1.9.1.3").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Walk).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_walk_at_end_of_mib() {
        let mut handle = handle(sys_or_table());
        let anchor = parse_oid("1.3.6.1.2.1.1.9.1.4").unwrap();

        let results = traverse(&mut handle, &anchor, Mode::Walk).await.unwrap();
        assert_eq!(oids(&results), vec!["1.3.6.1.2.1.1.9.1.4.1"]);

        let anchor = parse_oid("1.3.6.1.4").unwrap();
        let results = traverse(&mut handle, &anchor, Mode::Walk).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_agent_error_is_fatal_and_wrapped() {
        let agent = sys_or_table().with_error("1.3.6.1.2.1.1.9.1.3.1", 5);
        let mut handle = handle(agent);
        let anchor = parse_oid("1.3.6.1.2.1.1.9.1.3").unwrap();

        let err = traverse(&mut handle, &anchor, Mode::Table).await.unwrap_err();

        match err {
            Error::Traversal { oid, mode, source } => {
                assert_eq!(oid, "1.3.6.1.2.1.1.9.1.3");
                assert_eq!(mode, Mode::Table);
                assert!(matches!(*source, Error::Agent { status: 5, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
