use std::net::Ipv4Addr;

use crate::models::{CoreError, CoreResult};

/// Declarative host-range input: comma-separated expressions, each an IPv4
/// CIDR block (`10.0.0.0/30`), an inclusive address range (`10.0.0.1-10.0.0.4`,
/// shorthand `10.0.0.1-4`), or a literal hostname. Expansion order is
/// deterministic: expressions left to right, addresses ascending.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostRangeSpec {
    exprs: Vec<HostExpr>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum HostExpr {
    Block { start: u32, count: u64 },
    Literal(String),
}

impl HostRangeSpec {
    pub fn parse(input: &str) -> CoreResult<Self> {
        let mut exprs = Vec::new();
        for raw in input.split(',') {
            let expr = raw.trim();
            if expr.is_empty() {
                return Err(range_error(input, "empty expression"));
            }
            exprs.push(parse_expr(expr)?);
        }
        Ok(Self { exprs })
    }

    /// Lazy expansion; a large block costs nothing until iterated.
    pub fn into_hosts(self) -> HostIter {
        HostIter {
            exprs: self.exprs.into_iter(),
            block: None,
        }
    }
}

pub struct HostIter {
    exprs: std::vec::IntoIter<HostExpr>,
    block: Option<BlockCursor>,
}

struct BlockCursor {
    start: u32,
    count: u64,
    offset: u64,
}

impl Iterator for HostIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(cursor) = &mut self.block {
                if cursor.offset < cursor.count {
                    let addr = Ipv4Addr::from(cursor.start.wrapping_add(cursor.offset as u32));
                    cursor.offset += 1;
                    return Some(addr.to_string());
                }
                self.block = None;
            }
            match self.exprs.next()? {
                HostExpr::Literal(host) => return Some(host),
                HostExpr::Block { start, count } => {
                    self.block = Some(BlockCursor {
                        start,
                        count,
                        offset: 0,
                    });
                }
            }
        }
    }
}

fn parse_expr(expr: &str) -> CoreResult<HostExpr> {
    if let Some((base, prefix)) = expr.split_once('/') {
        return parse_cidr(expr, base, prefix);
    }

    // Hostnames may contain '-', so a range needs an address on its left.
    if let Some((start, end)) = expr.split_once('-')
        && let Ok(start_addr) = start.parse::<Ipv4Addr>()
    {
        return parse_range(expr, start_addr, end);
    }

    if expr.parse::<Ipv4Addr>().is_ok() || is_hostname(expr) {
        return Ok(HostExpr::Literal(expr.to_string()));
    }

    Err(range_error(
        expr,
        "not a CIDR block, address range, or hostname",
    ))
}

fn parse_cidr(expr: &str, base: &str, prefix: &str) -> CoreResult<HostExpr> {
    let addr: Ipv4Addr = base
        .parse()
        .map_err(|_| range_error(expr, "invalid IPv4 address"))?;
    let prefix: u8 = prefix
        .parse()
        .ok()
        .filter(|prefix| *prefix <= 32)
        .ok_or_else(|| range_error(expr, "prefix must be between 0 and 32"))?;

    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };

    // Every address in the block, network and broadcast included.
    Ok(HostExpr::Block {
        start: u32::from(addr) & mask,
        count: 1u64 << (32 - prefix),
    })
}

fn parse_range(expr: &str, start: Ipv4Addr, end: &str) -> CoreResult<HostExpr> {
    let start_num = u32::from(start);
    let end_num = if end.contains('.') {
        end.parse::<Ipv4Addr>()
            .map(u32::from)
            .map_err(|_| range_error(expr, "invalid IPv4 range end"))?
    } else {
        let octet: u8 = end
            .parse()
            .map_err(|_| range_error(expr, "range end must be an address or a final octet"))?;
        (start_num & 0xffff_ff00) | u32::from(octet)
    };

    if end_num < start_num {
        return Err(range_error(expr, "range end precedes range start"));
    }

    Ok(HostExpr::Block {
        start: start_num,
        count: u64::from(end_num - start_num) + 1,
    })
}

fn is_hostname(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn range_error(expr: &str, reason: &str) -> CoreError {
    CoreError::HostRange {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}
