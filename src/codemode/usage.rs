//! Static usage snippets shown by `help()`.

/// Root object the bindings are exposed under inside the sandbox.
pub const SANDBOX_ROOT: &str = "pg";

pub const USAGE: &str = "Call pg.<group>.<method>(...args). Arguments may be one options object, \
    positional values, or positional values followed by an options object. \
    Use pg.<group>.help() to list a group's methods.";

/// Illustrative calls for one group; empty for unknown groups.
pub fn examples(group: &str) -> &'static [&'static str] {
    match group {
        "core" => &[
            "await pg.core.readQuery('SELECT * FROM orders WHERE total > 100')",
            "await pg.core.readQuery({ sql: 'SELECT * FROM orders', limit: 10 })",
            "await pg.core.describeTable('orders')",
            "await pg.core.createIndex('orders', ['customer_id'], { unique: true })",
            "await pg.core.count('orders', 'status = \\'open\\'')",
        ],
        "transactions" => &[
            "await pg.transactions.execute(['INSERT INTO a VALUES (1)', 'UPDATE b SET n = n + 1'])",
            "await pg.transaction(['DELETE FROM sessions WHERE expired'])",
        ],
        "json" => &[
            "await pg.json.extract('users', 'profile', 'address.city')",
            "await pg.json.set('users', 'profile', 'theme', 'dark', { where: 'id = 1' })",
            "await pg.json.contains('events', 'payload', { kind: 'click' })",
        ],
        "fulltext" => &[
            "await pg.fulltext.fulltextSearch('articles', ['title', 'body'], 'connection pooling')",
            "await pg.fulltext.fulltextCreateIndex('articles', ['title', 'body'])",
        ],
        "performance" => &[
            "await pg.performance.explain('SELECT * FROM orders WHERE id = 1')",
            "await pg.performance.explain({ sql: 'SELECT count(*) FROM orders', analyze: true })",
            "await pg.performance.cacheHitRatio()",
        ],
        "admin" => &[
            "await pg.admin.vacuum('orders', { analyze: true })",
            "await pg.admin.reindex('orders')",
        ],
        "docstore" => &[
            "await pg.docstore.createCollection('events')",
            "await pg.docstore.insert('events', [{ kind: 'click' }, { kind: 'view' }])",
            "await pg.docstore.find('events', { kind: 'click' })",
        ],
        _ => &[],
    }
}
