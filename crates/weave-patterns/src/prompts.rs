//! Prompt constants and templates shared by the workflow patterns.
//!
//! Templates use `{{token}}` placeholders filled with
//! `weave_core::template::fill` immediately before each invocation.

pub const ROUTER_SYSTEM_PROMPT: &str = r#"You are a classifier that routes a request to exactly one of the available handlers.

Pick the single best route. The route field must be one of the listed handler names, verbatim."#;

pub const GENERATE_PROMPT: &str = r#"Complete the following task. Produce your best full answer, not a plan.

Task: {{task}}"#;

pub const EVALUATE_OUTPUT_PROMPT: &str = r#"You are a strict reviewer. Assess the output below against the task.

Task: {{task}}

Output:
{{output}}

Score quality from 0 to 10. Set meets_criteria to true only if the output fully satisfies the task as written."#;

pub const OPTIMIZE_OUTPUT_PROMPT: &str = r#"Improve the output below so it fully satisfies the task. Address every listed issue.

Task: {{task}}

Current output:
{{output}}

Issues:
{{issues}}

Suggestions:
{{suggestions}}

Return the complete improved output, not a diff."#;

pub const PLAN_SUBTASKS_PROMPT: &str = r#"Break the following task into independent subtasks that can run in any order. Keep each subtask self-contained.

Task: {{task}}"#;

pub const WORKER_PROMPT: &str = r#"You are one worker in a larger plan. Complete only your assigned subtask.

Overall task: {{task}}

Your subtask: {{subtask}}"#;

pub const ORCHESTRATOR_EVAL_PROMPT: &str = r#"Review the combined subtask results below against the task. If the task is fully satisfied, say so plainly using the word "complete". Otherwise describe precisely what is missing or wrong.

Task: {{task}}

Results:
{{results}}"#;

pub const REDUCE_PROMPT: &str = r#"Combine the mapped results below into one coherent answer to the task. Resolve conflicts, remove duplication.

Task: {{task}}

Results:
{{results}}"#;

pub const CONSENSUS_PROMPT: &str = r#"Several independent attempts at the same task are listed below. Determine the answer the attempts agree on.

{{candidates}}"#;

pub const REACT_STEP_PROMPT: &str = r#"You are working through a task step by step. At each step, state your reasoning, then choose one action. When the task is done, use the action "finish".

Task: {{task}}

History so far:
{{history}}"#;

pub const TREE_GENERATE_PROMPT: &str = r#"Continue this line of reasoning with one distinct next thought. Be concrete.

Current thought: {{thought}}"#;

pub const TREE_EVALUATE_PROMPT: &str = r#"Evaluate each candidate continuation below for promise and correctness. Comment on each by its label.

{{candidates}}"#;

pub const TREE_SELECT_PROMPT: &str = r#"Based on the evaluations below, reply with the full text of the single best candidate thought and nothing else.

{{evaluations}}"#;
