use crate::commands::{filters, index, saved};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

/// End-to-end path a payload takes, shown in the top-level help.
pub const WORKFLOW: &[ExampleGroup] = &[
    ExampleGroup {
        title: "From Payload To Results",
        commands: &[
            "spotex filters validate lane.json                       # 1. reject bad input",
            "spotex filters query lane.json --tenant <tenant-uuid>   # 2. see the scoped query",
            "spotex index ensure                                     # 3. make sure the index exists",
            "spotex saved create --user <user-uuid> --tenant <tenant-uuid> --name \"Chicago flats\" --filters lane.json",
            "spotex saved use <search-id> --user <user-uuid> --run   # 4. run it, rate limited",
        ],
    },
];

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "filters",
            groups: filters::EXAMPLES,
        },
        CommandExample {
            name: "index",
            groups: index::EXAMPLES,
        },
        CommandExample {
            name: "saved",
            groups: saved::EXAMPLES,
        },
    ]
}
