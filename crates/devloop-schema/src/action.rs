//! Action types

string_enum! {
    /// Kind of request an agent or a user can make
    pub enum ActionType: "action type" {
        /// Initializes the agent. Only sent by the client.
        Init => "initialize",
        /// Reads the content of a file.
        Read => "read",
        /// Writes the content to a file.
        Write => "write",
        /// Runs a command.
        Run => "run",
        /// Runs a IPython cell.
        RunIpython => "run_ipython",
        /// Kills a background command.
        Kill => "kill",
        /// Opens a web page.
        Browse => "browse",
        /// Searches long-term memory.
        Recall => "recall",
        /// Allows the agent to make a plan, set a goal, or record thoughts.
        Think => "think",
        /// Represents a message.
        Message => "message",
        /// Delegates a task to another agent.
        Delegate => "delegate",
        /// If you're absolutely certain that you've completed your task and have
        /// tested your work, use the finish action to stop working.
        Finish => "finish",
        /// If you're absolutely certain that you cannot complete the task with
        /// given requirements, use the reject action to stop working.
        Reject => "reject",
        /// Adds a subtask to the plan.
        AddTask => "add_task",
        /// Changes the state of a subtask.
        ModifyTask => "modify_task",
        /// Requests a change of the agent's lifecycle state.
        ChangeAgentState => "change_agent_state",
        /// Does nothing.
        Null => "null",
    }
}
